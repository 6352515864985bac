//! # Logging Initialization
//!
//! `init_logging()` installs the global `tracing` subscriber once per process,
//! guarded by a `std::sync::Once`; later calls are no-ops.
//!
//! ## Logging Configuration
//!
//! 1.  **Environment Filter (`EnvFilter`)**: `RUST_LOG` wins when set.
//!     Otherwise the requested level applies to dependencies while both
//!     `quarry` crates log at `debug`.
//!
//! 2.  **File Logging (Default)**: a daily rolling `quarry.log` in the user's
//!     cache directory (from the `directories` crate), written through a
//!     non-blocking `tracing_appender` writer without ANSI colors. Command
//!     output on stdout stays clean.
//!
//! 3.  **Stderr Logging**: `--log-to-stderr` (or `log_to_file = false` in
//!     the config file) writes colored logs to stderr instead.
//!
//! 4.  **Stderr Fallback**: when the cache directory cannot be determined or
//!     is not writable, logs go to stderr.

use anyhow::Result;
use directories::ProjectDirs;
use std::{io::stderr, path::Path, sync::Once};
use tracing_subscriber::{EnvFilter, fmt::layer, prelude::*};

static INIT: Once = Once::new();

/// Name of the rolling log file inside the cache directory.
pub const LOG_FILE_NAME: &str = "quarry.log";

/// Initialize verbose logging for tests (stderr, `trace`).
pub fn init_test_logging() {
    init_logging("trace", false).expect("Failed to initialize test logging");
}

/// Default `EnvFilter` directive for a requested level.
pub fn default_filter(log_level: &str) -> String {
    format!("{log_level},quarry_cli=debug,quarry_sandbox=debug")
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Never fails today; the `Result` leaves room for fallible sinks.
pub fn init_logging(log_level: &str, log_to_file: bool) -> Result<()> {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

        if log_to_file && let Some(proj_dirs) = ProjectDirs::from("dev", "Quarry", "quarry") {
            let log_dir = proj_dirs.cache_dir();

            // tracing_appender::rolling::daily panics on permission errors.
            let file_appender_result = if can_write_to(log_dir) {
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME)
                }))
            } else {
                Err(Box::new("Cannot write to log directory") as Box<dyn std::any::Any + Send>)
            };

            if let Ok(file_appender) = file_appender_result {
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer().with_writer(non_blocking).with_ansi(false))
                    .init();
                // Leaked so buffered lines are flushed at exit.
                Box::leak(Box::new(guard));
                return;
            }
        }

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer().with_writer(stderr).with_ansi(true))
            .init();
    });

    Ok(())
}

/// Creates `dir` if needed and probes it with a throwaway file.
fn can_write_to(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }

    let probe = dir.join(".quarry_log_probe");
    match std::fs::write(&probe, "probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_raises_quarry_crates_to_debug() {
        assert_eq!(
            default_filter("warn"),
            "warn,quarry_cli=debug,quarry_sandbox=debug"
        );
    }

    #[test]
    fn can_write_to_creates_missing_directory() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a/b");
        assert!(can_write_to(&nested));
        assert!(nested.is_dir());
        assert!(!nested.join(".quarry_log_probe").exists());
    }

    #[cfg(unix)]
    #[test]
    fn can_write_to_rejects_a_file_path() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("plain");
        std::fs::write(&file, "x").unwrap();
        assert!(!can_write_to(&file));
    }

    #[test]
    fn init_logging_is_idempotent() {
        init_test_logging();
        init_logging("info", false).unwrap();
        tracing::debug!("logging initialized twice without panicking");
    }
}
