use serde::Serialize;
use std::fmt;
use std::io;

/// Machine-checkable classification of a sandbox failure.
///
/// Callers branch on the kind (exit codes, retry decisions); the message text
/// is for humans only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FsErrorKind {
    InvalidPath,
    PathTraversal,
    PathViolation,
    PathVerificationFailed,
    IsDirectory,
    FileTooLarge,
    ContentTooLarge,
    DirectoryNotFound,
    ReadError,
    WriteError,
    StatError,
    ListError,
    JsonParseError,
    JsonSerializeError,
    SchemaValidationError,
    PrototypePollutionDetected,
    InvalidRoot,
}

impl FsErrorKind {
    /// Stable identifier for logs and user-facing messages.
    pub fn code(self) -> &'static str {
        match self {
            FsErrorKind::InvalidPath => "INVALID_PATH",
            FsErrorKind::PathTraversal => "PATH_TRAVERSAL",
            FsErrorKind::PathViolation => "PATH_VIOLATION",
            FsErrorKind::PathVerificationFailed => "PATH_VERIFICATION_FAILED",
            FsErrorKind::IsDirectory => "IS_DIRECTORY",
            FsErrorKind::FileTooLarge => "FILE_TOO_LARGE",
            FsErrorKind::ContentTooLarge => "CONTENT_TOO_LARGE",
            FsErrorKind::DirectoryNotFound => "DIRECTORY_NOT_FOUND",
            FsErrorKind::ReadError => "READ_ERROR",
            FsErrorKind::WriteError => "WRITE_ERROR",
            FsErrorKind::StatError => "STAT_ERROR",
            FsErrorKind::ListError => "LIST_ERROR",
            FsErrorKind::JsonParseError => "JSON_PARSE_ERROR",
            FsErrorKind::JsonSerializeError => "JSON_SERIALIZE_ERROR",
            FsErrorKind::SchemaValidationError => "SCHEMA_VALIDATION_ERROR",
            FsErrorKind::PrototypePollutionDetected => "PROTOTYPE_POLLUTION_DETECTED",
            FsErrorKind::InvalidRoot => "INVALID_ROOT",
        }
    }

    /// Kinds raised because the input itself is hostile or out of bounds.
    /// These are permanent: repeating the call can never succeed.
    pub fn is_security_violation(self) -> bool {
        matches!(
            self,
            FsErrorKind::InvalidPath
                | FsErrorKind::PathTraversal
                | FsErrorKind::PathViolation
                | FsErrorKind::PathVerificationFailed
                | FsErrorKind::PrototypePollutionDetected
        )
    }

    /// Kinds that wrap an unclassified OS failure.
    pub fn is_io_failure(self) -> bool {
        matches!(
            self,
            FsErrorKind::ReadError
                | FsErrorKind::WriteError
                | FsErrorKind::StatError
                | FsErrorKind::ListError
        )
    }
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors raised by every sandbox operation.
///
/// Carries the offending path as the caller spelled it, but never any file
/// contents. The `Display` form escapes control characters in the path so a
/// rejected path cannot smuggle terminal escapes into logs or stderr.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message} (path: {})", escape_path(.path))]
pub struct FileSystemError {
    kind: FsErrorKind,
    path: String,
    message: String,
    #[source]
    source: Option<io::Error>,
}

impl FileSystemError {
    pub fn new(kind: FsErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an OS error. Its text is appended to `message` and it stays
    /// reachable through `source()`.
    pub fn io(
        kind: FsErrorKind,
        path: impl Into<String>,
        message: impl Into<String>,
        source: io::Error,
    ) -> Self {
        let message = format!("{}: {}", message.into(), source);
        Self {
            kind,
            path: path.into(),
            message,
            source: Some(source),
        }
    }

    pub fn kind(&self) -> FsErrorKind {
        self.kind
    }

    /// The path exactly as supplied. May contain control characters; use
    /// [`FileSystemError::display_path`] for anything shown to a user.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn display_path(&self) -> String {
        escape_path(&self.path)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_security_violation(&self) -> bool {
        self.kind.is_security_violation()
    }

    /// True only for OS failures that may clear up on their own
    /// (interrupted, would-block, timed-out).
    pub fn is_retryable(&self) -> bool {
        self.kind.is_io_failure()
            && self.source.as_ref().is_some_and(|e| {
                matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                )
            })
    }
}

/// Render a path for humans, escaping NUL and other control characters.
pub fn escape_path(path: &str) -> String {
    if !path.chars().any(|c| c.is_control()) {
        return path.to_string();
    }
    path.chars().flat_map(char::escape_default).collect()
}
