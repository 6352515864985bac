//! Shared fixtures for sandbox integration tests.
#![allow(dead_code)]

use quarry_sandbox::{DEFAULT_MAX_FILE_SIZE, Sandbox};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding an allowed root (`root/`) and a sibling
/// directory outside the sandbox (`outside/`).
pub struct Fixture {
    _temp: TempDir,
    pub root: PathBuf,
    pub outside: PathBuf,
    pub sandbox: Sandbox,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_FILE_SIZE)
    }

    pub fn with_limit(max_file_size: u64) -> Self {
        let temp = TempDir::new().expect("tempdir");
        let base = std::fs::canonicalize(temp.path()).expect("canonical tempdir");
        let root = base.join("root");
        let outside = base.join("outside");
        std::fs::create_dir(&root).expect("create root");
        std::fs::create_dir(&outside).expect("create outside");
        let sandbox = Sandbox::new(vec![root.clone()], max_file_size).expect("sandbox");
        Self {
            _temp: temp,
            root,
            outside,
            sandbox,
        }
    }

    /// Absolute path string for `relative` under the allowed root.
    pub fn path(&self, relative: &str) -> String {
        format!("{}/{}", self.root.display(), relative)
    }

    pub fn write_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parents");
        }
        std::fs::write(&path, contents).expect("write fixture file");
        path
    }
}

pub fn as_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}
