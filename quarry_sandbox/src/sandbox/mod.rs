//! # Sandboxed File Access
//!
//! Every path a user hands to `quarry` (query-input files, URL lists, JSON
//! schema files, exported sessions) goes through a [`Sandbox`] before it
//! touches the filesystem. The sandbox guarantees that no operation reads or
//! writes outside its allowed roots, however the path is spelled.
//!
//! ## Layers
//!
//! - **Validation** (`Sandbox::validate`): percent-decoding, control-character
//!   and traversal rejection, containment and symlink re-resolution.
//! - **Bounded I/O** (`read`, `write`, `stat`, `list`, `exists`): size-capped
//!   operations over validated paths.
//! - **Safe JSON** (`read_json`, `write_json`): parsing hardened against
//!   prototype-pollution keys with an optional schema hook.
//!
//! Every failure is a [`FileSystemError`] whose [`FsErrorKind`] is what
//! callers branch on.

mod bounded_io;
pub(crate) mod core;
mod decode;
mod error;
mod safe_json;
mod schema;
mod scopes;
mod types;
mod validator;

pub use self::core::Sandbox;
pub use error::{FileSystemError, FsErrorKind, escape_path};
pub use safe_json::parse_json;
pub use schema::{JsonSchema, SchemaValidator};
pub use scopes::normalize_path_lexically;
pub use types::{DEFAULT_MAX_FILE_SIZE, FileStat, WriteOptions};
