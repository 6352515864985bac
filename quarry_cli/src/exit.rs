//! Process exit codes and the one-line error format printed on stderr.
//!
//! | code | meaning |
//! |---|---|
//! | 0 | success |
//! | 1 | unclassified failure, or `exists` on an absent path |
//! | 2 | usage error (reported by `clap`) |
//! | 3 | security rejection |
//! | 4 | target missing or of the wrong type |
//! | 5 | size limit exceeded |
//! | 6 | invalid JSON or schema mismatch |
//! | 7 | operating-system I/O failure |
//! | 8 | invalid configuration or sandbox root |

use crate::config::ConfigError;
use crate::inputs::InputError;
use quarry_sandbox::{FileSystemError, FsErrorKind, sandbox::escape_path};

pub const SUCCESS: u8 = 0;
pub const FAILURE: u8 = 1;
pub const USAGE: u8 = 2;
pub const SECURITY: u8 = 3;
pub const NOT_FOUND: u8 = 4;
pub const TOO_LARGE: u8 = 5;
pub const INVALID_DATA: u8 = 6;
pub const IO: u8 = 7;
pub const CONFIG: u8 = 8;

pub fn code_for_kind(kind: FsErrorKind) -> u8 {
    match kind {
        FsErrorKind::InvalidPath
        | FsErrorKind::PathTraversal
        | FsErrorKind::PathViolation
        | FsErrorKind::PathVerificationFailed
        | FsErrorKind::PrototypePollutionDetected => SECURITY,
        FsErrorKind::IsDirectory | FsErrorKind::DirectoryNotFound => NOT_FOUND,
        FsErrorKind::FileTooLarge | FsErrorKind::ContentTooLarge => TOO_LARGE,
        FsErrorKind::JsonParseError
        | FsErrorKind::JsonSerializeError
        | FsErrorKind::SchemaValidationError => INVALID_DATA,
        FsErrorKind::ReadError
        | FsErrorKind::WriteError
        | FsErrorKind::StatError
        | FsErrorKind::ListError => IO,
        FsErrorKind::InvalidRoot => CONFIG,
    }
}

/// The sandbox failure somewhere in `err`'s chain, if any.
pub fn sandbox_error(err: &anyhow::Error) -> Option<&FileSystemError> {
    err.chain().find_map(|cause| cause.downcast_ref::<FileSystemError>())
}

pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(fs_err) = sandbox_error(err) {
        return code_for_kind(fs_err.kind());
    }
    if err.chain().any(|cause| cause.is::<ConfigError>()) {
        return CONFIG;
    }
    if let Some(input_err) = err.chain().find_map(|c| c.downcast_ref::<InputError>()) {
        return match input_err {
            InputError::InvalidUrls { .. } => INVALID_DATA,
            InputError::Stdin(_) => IO,
        };
    }
    FAILURE
}

/// `error[CODE]: message`, with control characters escaped.
pub fn render(err: &anyhow::Error) -> String {
    match sandbox_error(err) {
        Some(fs_err) => format!(
            "error[{}]: {} (path: {})",
            fs_err.kind().code(),
            escape_path(fs_err.message()),
            fs_err.display_path()
        ),
        None => {
            let code = if err.chain().any(|cause| cause.is::<ConfigError>()) {
                "CONFIG"
            } else {
                "QUARRY"
            };
            format!("error[{code}]: {}", escape_path(&format!("{err:#}")))
        }
    }
}
