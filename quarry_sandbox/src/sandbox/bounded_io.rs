//! Size-bounded file operations over validated paths.
//!
//! Every operation validates its path first and propagates the validation
//! failure unchanged. Nothing here retries or logs.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use super::core::Sandbox;
use super::error::{FileSystemError, FsErrorKind};
use super::types::{FileStat, WriteOptions};

impl Sandbox {
    /// Read a whole file.
    ///
    /// A stat of the canonical path gates the open, so a FIFO or device is
    /// never opened. Type and size are checked again on the opened handle,
    /// and the read itself stops one byte past the cap so a file that grows
    /// after the check still fails with `FileTooLarge`.
    pub fn read(&self, path: &str) -> Result<Vec<u8>, FileSystemError> {
        let canonical = self.validate(path)?;

        let metadata = fs::metadata(&canonical)
            .map_err(|e| FileSystemError::io(FsErrorKind::ReadError, path, "failed to stat file", e))?;
        self.check_readable(path, &metadata)?;

        let mut file = File::open(&canonical)
            .map_err(|e| FileSystemError::io(FsErrorKind::ReadError, path, "failed to open file", e))?;
        let metadata = file.metadata().map_err(|e| {
            FileSystemError::io(FsErrorKind::ReadError, path, "failed to stat open file", e)
        })?;
        self.check_readable(path, &metadata)?;

        let mut buffer = Vec::with_capacity(metadata.len() as usize);
        (&mut file)
            .take(self.max_file_size.saturating_add(1))
            .read_to_end(&mut buffer)
            .map_err(|e| FileSystemError::io(FsErrorKind::ReadError, path, "failed to read file", e))?;

        if buffer.len() as u64 > self.max_file_size {
            return Err(self.too_large(FsErrorKind::FileTooLarge, path, buffer.len() as u64));
        }

        Ok(buffer)
    }

    fn check_readable(&self, path: &str, metadata: &fs::Metadata) -> Result<(), FileSystemError> {
        if metadata.is_dir() {
            return Err(FileSystemError::new(
                FsErrorKind::IsDirectory,
                path,
                "cannot read a directory",
            ));
        }
        if !metadata.is_file() {
            return Err(FileSystemError::new(
                FsErrorKind::ReadError,
                path,
                "not a regular file",
            ));
        }
        if metadata.len() > self.max_file_size {
            return Err(self.too_large(FsErrorKind::FileTooLarge, path, metadata.len()));
        }
        Ok(())
    }

    /// [`Sandbox::read`] followed by UTF-8 decoding.
    pub fn read_to_string(&self, path: &str) -> Result<String, FileSystemError> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|_| {
            FileSystemError::new(FsErrorKind::ReadError, path, "file is not valid UTF-8")
        })
    }

    /// Write `contents` to `path`, replacing any existing file.
    ///
    /// The bytes go to a temporary file in the target directory which is then
    /// renamed over the target, so a failed write leaves the previous
    /// contents in place.
    pub fn write(
        &self,
        path: &str,
        contents: &[u8],
        options: WriteOptions,
    ) -> Result<(), FileSystemError> {
        let canonical = self.validate(path)?;

        if contents.len() as u64 > self.max_file_size {
            return Err(self.too_large(FsErrorKind::ContentTooLarge, path, contents.len() as u64));
        }

        let parent = canonical.parent().ok_or_else(|| {
            FileSystemError::new(FsErrorKind::WriteError, path, "path has no parent directory")
        })?;

        if options.create_parents {
            fs::create_dir_all(parent).map_err(|e| {
                FileSystemError::io(
                    FsErrorKind::WriteError,
                    path,
                    "failed to create parent directories",
                    e,
                )
            })?;
        }

        let existing = match fs::metadata(&canonical) {
            Ok(metadata) if metadata.is_dir() => {
                return Err(FileSystemError::new(
                    FsErrorKind::IsDirectory,
                    path,
                    "cannot overwrite a directory",
                ));
            }
            Ok(metadata) => Some(metadata),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(FileSystemError::io(
                    FsErrorKind::WriteError,
                    path,
                    "failed to stat target",
                    e,
                ));
            }
        };

        write_atomically(parent, &canonical, contents, existing.as_ref())
            .map_err(|e| FileSystemError::io(FsErrorKind::WriteError, path, "failed to write file", e))
    }

    pub fn stat(&self, path: &str) -> Result<FileStat, FileSystemError> {
        let canonical = self.validate(path)?;
        let metadata = fs::metadata(&canonical)
            .map_err(|e| FileSystemError::io(FsErrorKind::StatError, path, "failed to stat", e))?;

        Ok(FileStat {
            size: metadata.len(),
            is_directory: metadata.is_dir(),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// Names of the direct children of a directory, sorted.
    pub fn list(&self, path: &str) -> Result<Vec<String>, FileSystemError> {
        let canonical = self.validate(path)?;

        let entries = fs::read_dir(&canonical).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FileSystemError::io(
                FsErrorKind::DirectoryNotFound,
                path,
                "directory does not exist",
                e,
            ),
            _ => FileSystemError::io(FsErrorKind::ListError, path, "failed to list directory", e),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                FileSystemError::io(FsErrorKind::ListError, path, "failed to read directory entry", e)
            })?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Whether `path` validates and exists. Never fails: a rejected or
    /// inaccessible path is reported as absent.
    pub fn exists(&self, path: &str) -> bool {
        self.validate(path)
            .is_ok_and(|canonical| fs::metadata(canonical).is_ok())
    }

    fn too_large(&self, kind: FsErrorKind, path: &str, size: u64) -> FileSystemError {
        FileSystemError::new(
            kind,
            path,
            format!(
                "{size} bytes exceeds the {} byte limit",
                self.max_file_size
            ),
        )
    }
}

fn write_atomically(
    dir: &Path,
    target: &Path,
    contents: &[u8],
    existing: Option<&fs::Metadata>,
) -> io::Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    if let Some(metadata) = existing {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
