//! Candidate path validation.
//!
//! The checks run in a fixed order and the first failure wins:
//!
//! 1. percent-decode once, flagging encoded or double-encoded traversal;
//! 2. reject NUL and ASCII control characters (raw or decoded);
//! 3. reject `..` segments and a leading `~`;
//! 4. reject drive-letter and UNC prefixes on every host;
//! 5. resolve against the working directory and normalize lexically;
//! 6. require component-wise containment in an allowed root;
//! 7. canonicalize (symlinks included) and require containment again.
//!
//! The result is only valid at the instant it was computed. Another process
//! with write access to a root can still swap a component for a symlink
//! between validation and the I/O that follows.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use super::decode::{Suspicion, decode_candidate};
use super::error::{FileSystemError, FsErrorKind};
use super::scopes::{AllowedRoots, normalize_path_lexically};

pub(super) fn validate_candidate(
    candidate: &str,
    roots: &AllowedRoots,
) -> Result<PathBuf, FileSystemError> {
    let reject = |kind: FsErrorKind, message: &str| FileSystemError::new(kind, candidate, message);

    let decoded = decode_candidate(candidate).ok_or_else(|| {
        reject(
            FsErrorKind::InvalidPath,
            "percent-decoded path is not valid UTF-8",
        )
    })?;

    if has_forbidden_bytes(candidate) || has_forbidden_bytes(&decoded.text) {
        return Err(reject(
            FsErrorKind::InvalidPath,
            "path contains a null byte or control character",
        ));
    }

    match decoded.suspicion {
        Suspicion::Traversal => {
            return Err(reject(
                FsErrorKind::PathTraversal,
                "path contains an encoded traversal sequence",
            ));
        }
        Suspicion::EncodedControl => {
            return Err(reject(
                FsErrorKind::InvalidPath,
                "path contains an encoded control character",
            ));
        }
        Suspicion::None => {}
    }

    let decoded = decoded.text;

    for spelling in [candidate, decoded.as_str()] {
        if has_dot_dot_segment(spelling) {
            return Err(reject(
                FsErrorKind::PathTraversal,
                "path contains a '..' segment",
            ));
        }
        if spelling.starts_with('~') {
            return Err(reject(
                FsErrorKind::PathTraversal,
                "home-directory expansion ('~') is not allowed",
            ));
        }
        if has_foreign_prefix(spelling) {
            return Err(reject(
                FsErrorKind::PathTraversal,
                "drive-letter or UNC paths are not allowed",
            ));
        }
    }

    if decoded.is_empty() {
        return Err(reject(FsErrorKind::InvalidPath, "path is empty"));
    }

    let resolved = resolve_absolute(&decoded, candidate)?;

    if !roots.contains_lexically(&resolved) {
        return Err(reject(
            FsErrorKind::PathViolation,
            "path is outside every allowed root",
        ));
    }

    let real = resolve_real(&resolved, candidate)?;

    if !roots.contains(&real) {
        return Err(reject(
            FsErrorKind::PathVerificationFailed,
            "symbolic link resolves outside every allowed root",
        ));
    }

    Ok(real)
}

fn has_forbidden_bytes(s: &str) -> bool {
    s.bytes().any(|b| b < 0x20 || b == 0x7f)
}

fn has_dot_dot_segment(s: &str) -> bool {
    s.split(['/', '\\']).any(|segment| segment == "..")
}

/// `C:\`, `C:/`, bare `C:`, or a `\\server` UNC prefix.
fn has_foreign_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    let drive = bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes.get(2), None | Some(b'\\') | Some(b'/'));
    drive || s.starts_with("\\\\")
}

fn resolve_absolute(decoded: &str, candidate: &str) -> Result<PathBuf, FileSystemError> {
    let path = Path::new(decoded);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|e| {
            FileSystemError::io(
                FsErrorKind::PathVerificationFailed,
                candidate,
                "cannot resolve relative path without a working directory",
                e,
            )
        })?;
        cwd.join(path)
    };
    Ok(normalize_path_lexically(&absolute))
}

/// Canonicalize `resolved`, tolerating trailing segments that do not exist
/// yet (a file about to be created). The deepest existing ancestor is
/// canonicalized instead and the missing tail re-appended.
fn resolve_real(resolved: &Path, candidate: &str) -> Result<PathBuf, FileSystemError> {
    let verification_failed = |e: io::Error| {
        FileSystemError::io(
            FsErrorKind::PathVerificationFailed,
            candidate,
            "could not resolve symbolic links",
            e,
        )
    };

    let mut missing: Vec<OsString> = Vec::new();
    let mut current = resolved;

    loop {
        match std::fs::canonicalize(current) {
            Ok(mut real) => {
                real.extend(missing.iter().rev());
                return Ok(real);
            }
            Err(e) if !is_missing(&e) => return Err(verification_failed(e)),
            Err(e) => {
                // The entry exists but cannot be followed: a dangling link.
                if std::fs::symlink_metadata(current).is_ok() {
                    return Err(verification_failed(e));
                }
                let (Some(parent), Some(name)) = (current.parent(), current.file_name()) else {
                    return Err(verification_failed(e));
                };
                missing.push(name.to_os_string());
                current = parent;
            }
        }
    }
}

/// `NotADirectory` covers a segment below a regular file (`f.txt/child`),
/// which cannot exist either.
fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
