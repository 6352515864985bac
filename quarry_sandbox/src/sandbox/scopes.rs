use std::path::{Component, Path, PathBuf};

use super::error::{FileSystemError, FsErrorKind};

/// The allowed root set, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct AllowedRoots {
    /// Fully resolved roots. The final containment check uses only these.
    pub canonical: Vec<PathBuf>,
    /// Absolute spellings the caller used for a root when they differ from the
    /// canonical form (e.g. `/tmp` for `/private/tmp`). They let the lexical
    /// pre-check accept aliased paths; the canonical check still decides.
    pub aliases: Vec<PathBuf>,
}

impl AllowedRoots {
    pub fn contains_lexically(&self, path: &Path) -> bool {
        is_within_any(path, &self.canonical) || is_within_any(path, &self.aliases)
    }

    pub fn contains(&self, real_path: &Path) -> bool {
        is_within_any(real_path, &self.canonical)
    }
}

/// Canonicalize and validate the allowed roots.
///
/// Every root must exist and be a directory. The filesystem root is rejected.
/// Duplicates (after canonicalization) are collapsed, keeping the first.
pub(super) fn canonicalize_roots(roots: Vec<PathBuf>) -> Result<AllowedRoots, FileSystemError> {
    let mut canonicalized: Vec<PathBuf> = Vec::with_capacity(roots.len());
    let mut aliases: Vec<PathBuf> = Vec::new();
    for root in roots {
        let display = root.display().to_string();
        if root.as_os_str().is_empty() {
            return Err(FileSystemError::new(
                FsErrorKind::InvalidRoot,
                display,
                "empty path is not a valid sandbox root",
            ));
        }

        let canonical = std::fs::canonicalize(&root).map_err(|e| {
            FileSystemError::io(
                FsErrorKind::InvalidRoot,
                display.clone(),
                "failed to canonicalize sandbox root",
                e,
            )
        })?;

        if is_filesystem_root(&canonical) {
            return Err(FileSystemError::new(
                FsErrorKind::InvalidRoot,
                display,
                format!(
                    "filesystem root is not a valid sandbox root (resolved to '{}')",
                    canonical.display()
                ),
            ));
        }

        if !canonical.is_dir() {
            return Err(FileSystemError::new(
                FsErrorKind::InvalidRoot,
                display,
                "sandbox root is not a directory",
            ));
        }

        if let Some(alias) = absolute_spelling(&root)
            && alias != canonical
            && !aliases.contains(&alias)
        {
            aliases.push(alias);
        }

        if !canonicalized.contains(&canonical) {
            canonicalized.push(canonical);
        }
    }
    Ok(AllowedRoots {
        canonical: canonicalized,
        aliases,
    })
}

fn absolute_spelling(root: &Path) -> Option<PathBuf> {
    let absolute = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(root)
    };
    Some(normalize_path_lexically(&absolute))
}

fn is_filesystem_root(path: &Path) -> bool {
    path.parent().is_none()
}

/// Normalize a path lexically (without filesystem access).
///
/// Drops `.` components and collapses repeated or trailing separators. A `..`
/// component pops the previous normal component but never climbs above the
/// root.
pub fn normalize_path_lexically(path: &Path) -> PathBuf {
    let mut stack = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if stack
                    .last()
                    .is_some_and(|c| matches!(c, Component::Normal(_)))
                {
                    stack.pop();
                }
            }
            c => stack.push(c),
        }
    }

    stack.iter().collect()
}

/// Component-wise containment: `/allowed-evil` is never inside `/allowed`.
pub(super) fn is_within_any(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| path.starts_with(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_collapses_dots_and_separators() {
        assert_eq!(
            normalize_path_lexically(Path::new("/a/./b//c/")),
            PathBuf::from("/a/b/c")
        );
    }

    #[test]
    fn normalize_never_climbs_above_root() {
        assert_eq!(
            normalize_path_lexically(Path::new("/a/../../..")),
            PathBuf::from("/")
        );
    }

    #[test]
    fn sibling_prefix_is_not_contained() {
        let roots = vec![PathBuf::from("/allowed")];
        assert!(is_within_any(Path::new("/allowed/file"), &roots));
        assert!(is_within_any(Path::new("/allowed"), &roots));
        assert!(!is_within_any(Path::new("/allowed-evil/file"), &roots));
        assert!(!is_within_any(Path::new("/allowedfile"), &roots));
    }

    #[test]
    fn canonicalize_roots_rejects_filesystem_root() {
        let err = canonicalize_roots(vec![PathBuf::from("/")]).unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::InvalidRoot);
    }

    #[test]
    fn canonicalize_roots_rejects_missing_and_files() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        assert_eq!(
            canonicalize_roots(vec![missing]).unwrap_err().kind(),
            FsErrorKind::InvalidRoot
        );

        let file = temp.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert_eq!(
            canonicalize_roots(vec![file]).unwrap_err().kind(),
            FsErrorKind::InvalidRoot
        );
    }

    #[test]
    fn canonicalize_roots_dedupes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        let roots = canonicalize_roots(vec![root.clone(), root.join(".")]).unwrap();
        assert_eq!(roots.canonical.len(), 1);
        assert_eq!(roots.canonical[0], std::fs::canonicalize(&root).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn aliased_root_keeps_its_spelling_for_the_lexical_check() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let roots = canonicalize_roots(vec![link.clone()]).unwrap();
        assert!(roots.contains_lexically(&link.join("file.txt")));
        assert!(!roots.contains(&link.join("file.txt")));
        assert!(roots.contains(&std::fs::canonicalize(&real).unwrap().join("file.txt")));
    }
}
