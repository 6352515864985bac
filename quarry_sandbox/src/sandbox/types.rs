use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default cap applied to reads and writes: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Options for [`crate::sandbox::Sandbox::write`] and
/// [`crate::sandbox::Sandbox::write_json`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create missing ancestor directories (below the allowed root).
    pub create_parents: bool,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create_parents(mut self, create_parents: bool) -> Self {
        self.create_parents = create_parents;
        self
    }
}

/// Result of [`crate::sandbox::Sandbox::stat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub size: u64,
    pub is_directory: bool,
    /// `None` when the platform cannot report a modification time.
    pub last_modified: Option<DateTime<Utc>>,
}
