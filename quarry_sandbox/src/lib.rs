//! # quarry_sandbox
//!
//! The file-access layer of the `quarry` search client. See [`sandbox`].

pub mod sandbox;

pub use sandbox::{
    DEFAULT_MAX_FILE_SIZE, FileStat, FileSystemError, FsErrorKind, JsonSchema, Sandbox,
    SchemaValidator, WriteOptions, parse_json,
};
