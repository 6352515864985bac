use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::{FileSystemError, FsErrorKind};
use super::scopes::{self, AllowedRoots};
use super::types::DEFAULT_MAX_FILE_SIZE;
use super::validator;

/// The file-access sandbox: an immutable allowed-root set plus a size cap.
///
/// Cloning is cheap and clones share the root set. There is no interior
/// mutability, so a `Sandbox` can be used from any number of threads at once.
#[derive(Clone)]
pub struct Sandbox {
    pub(super) roots: Arc<AllowedRoots>,
    pub(super) max_file_size: u64,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("roots", &self.roots.canonical)
            .field("max_file_size", &self.max_file_size)
            .finish()
    }
}

impl Sandbox {
    /// Create a sandbox confined to `roots`.
    ///
    /// An empty `roots` list means the process working directory. Every root
    /// is canonicalized here, once; it must exist and be a directory.
    pub fn new(roots: Vec<PathBuf>, max_file_size: u64) -> Result<Self, FileSystemError> {
        let roots = if roots.is_empty() {
            vec![current_dir()?]
        } else {
            roots
        };

        let roots = scopes::canonicalize_roots(roots)?;
        tracing::debug!(
            roots = ?roots.canonical,
            max_file_size,
            "sandbox initialized"
        );

        Ok(Self {
            roots: Arc::new(roots),
            max_file_size,
        })
    }

    /// Sandbox rooted at the working directory with the default 10 MiB cap.
    pub fn from_current_dir() -> Result<Self, FileSystemError> {
        Self::new(Vec::new(), DEFAULT_MAX_FILE_SIZE)
    }

    /// The canonical allowed roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots.canonical
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Validate `candidate` and return its canonical form.
    ///
    /// Never creates, modifies or deletes anything; the only filesystem calls
    /// are the ones needed to resolve symbolic links.
    pub fn validate(&self, candidate: &str) -> Result<PathBuf, FileSystemError> {
        validator::validate_candidate(candidate, &self.roots)
    }

    /// Convenience for callers holding a `Path`. Non-UTF-8 paths are rejected
    /// with `InvalidPath`.
    pub fn validate_path(&self, path: &Path) -> Result<PathBuf, FileSystemError> {
        let candidate = path.to_str().ok_or_else(|| {
            FileSystemError::new(
                FsErrorKind::InvalidPath,
                path.to_string_lossy(),
                "path is not valid UTF-8",
            )
        })?;
        self.validate(candidate)
    }
}

fn current_dir() -> Result<PathBuf, FileSystemError> {
    std::env::current_dir().map_err(|e| {
        FileSystemError::io(
            FsErrorKind::InvalidRoot,
            ".",
            "failed to determine the working directory for the default root",
            e,
        )
    })
}
