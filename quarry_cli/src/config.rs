//! # Configuration
//!
//! Settings come from three places, highest priority first: command-line
//! flags, environment variables, and an optional TOML file.
//!
//! ## Config file discovery
//!
//! 1. `--config <FILE>`
//! 2. `QUARRY_CONFIG`
//! 3. `quarry.toml` in the working directory, if present
//!
//! ```toml
//! [sandbox]
//! roots = ["research", "/srv/shared/queries"]
//! max_file_size = 10485760
//!
//! [logging]
//! level = "info"
//! log_to_file = true
//!
//! [retry]
//! max_retries = 3
//! initial_delay_ms = 100
//! max_delay_ms = 5000
//! ```
//!
//! Relative `sandbox.roots` entries are resolved against the directory that
//! holds the config file. The file is read directly, not through the
//! sandbox: it is what defines the sandbox.
//!
//! Environment lookups are passed in as a closure so resolution can be
//! exercised without touching the process environment.

use crate::retry::RetryConfig;
use quarry_sandbox::DEFAULT_MAX_FILE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Names an explicit config file.
pub const CONFIG_ENV: &str = "QUARRY_CONFIG";
/// Platform path-list of sandbox roots.
pub const SCOPE_ENV: &str = "QUARRY_SANDBOX_SCOPE";
/// Looked up in the working directory when nothing else names a config file.
pub const DEFAULT_CONFIG_FILE: &str = "quarry.toml";

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Contents of a `quarry.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuarryConfig {
    #[serde(default)]
    pub sandbox: SandboxSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub retry: RetrySection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxSection {
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    pub max_file_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub log_to_file: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

impl QuarryConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A config file together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: QuarryConfig,
}

impl LoadedConfig {
    /// Directory that relative roots in the file are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

/// Values taken from the command line. `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sandbox_scope: Vec<PathBuf>,
    pub max_file_size: Option<u64>,
    pub config: Option<PathBuf>,
    pub debug: bool,
    pub log_to_stderr: bool,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Sandbox roots, absolute but not yet canonical.
    pub roots: Vec<PathBuf>,
    pub max_file_size: u64,
    pub log_level: String,
    pub log_to_file: bool,
    pub retry: RetryConfig,
    /// The config file that contributed, if any.
    pub config_path: Option<PathBuf>,
}

impl Settings {
    /// Merge flags, environment and config file.
    ///
    /// Root priority: `--sandbox-scope`, then `QUARRY_SANDBOX_SCOPE`, then
    /// `sandbox.roots`, then `cwd`.
    pub fn resolve<E>(overrides: &Overrides, env: E, cwd: &Path) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let loaded = match discover_config_path(overrides.config.as_deref(), &env, cwd) {
            Some(path) => Some(LoadedConfig {
                config: QuarryConfig::load(&path)?,
                path,
            }),
            None => None,
        };
        let config = loaded.as_ref().map(|l| &l.config);

        let roots = if !overrides.sandbox_scope.is_empty() {
            absolutize_all(&overrides.sandbox_scope, cwd)
        } else if let Some(scope) = env(SCOPE_ENV).filter(|s| !s.trim().is_empty()) {
            let listed: Vec<PathBuf> = std::env::split_paths(&scope)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            absolutize_all(&listed, cwd)
        } else if let Some(loaded) = loaded.as_ref().filter(|l| !l.config.sandbox.roots.is_empty())
        {
            absolutize_all(&loaded.config.sandbox.roots, loaded.base_dir())
        } else {
            vec![cwd.to_path_buf()]
        };

        let max_file_size = overrides
            .max_file_size
            .or_else(|| config.and_then(|c| c.sandbox.max_file_size))
            .unwrap_or(DEFAULT_MAX_FILE_SIZE);
        if max_file_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_file_size",
                reason: "must be greater than zero".to_string(),
            });
        }

        let log_level = if overrides.debug {
            "debug".to_string()
        } else {
            config
                .and_then(|c| c.logging.level.clone())
                .unwrap_or_else(|| "info".to_string())
                .to_ascii_lowercase()
        };
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::Invalid {
                field: "logging.level",
                reason: format!("'{log_level}' is not one of {}", LOG_LEVELS.join(", ")),
            });
        }

        let log_to_file = !overrides.log_to_stderr
            && config.and_then(|c| c.logging.log_to_file).unwrap_or(true);

        let mut retry = RetryConfig::default();
        if let Some(section) = config.map(|c| &c.retry) {
            if let Some(max_retries) = section.max_retries {
                retry = retry.with_max_retries(max_retries);
            }
            if let Some(delay_ms) = section.initial_delay_ms {
                retry = retry.with_initial_delay(Duration::from_millis(delay_ms));
            }
            if let Some(delay_ms) = section.max_delay_ms {
                retry = retry.with_max_delay(Duration::from_millis(delay_ms));
            }
        }

        Ok(Self {
            roots,
            max_file_size,
            log_level,
            log_to_file,
            retry,
            config_path: loaded.map(|l| l.path),
        })
    }
}

/// `--config`, then `QUARRY_CONFIG`, then `./quarry.toml` when it exists.
pub fn discover_config_path<E>(explicit: Option<&Path>, env: &E, cwd: &Path) -> Option<PathBuf>
where
    E: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return Some(absolutize(path, cwd));
    }
    if let Some(path) = env(CONFIG_ENV).filter(|p| !p.trim().is_empty()) {
        return Some(absolutize(Path::new(&path), cwd));
    }
    let local = cwd.join(DEFAULT_CONFIG_FILE);
    local.is_file().then_some(local)
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn absolutize_all(paths: &[PathBuf], base: &Path) -> Vec<PathBuf> {
    paths.iter().map(|p| absolutize(p, base)).collect()
}
