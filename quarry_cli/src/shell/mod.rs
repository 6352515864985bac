//! # Shell Module
//!
//! Entry point and command-line surface of the `quarry` binary.
//!
//! - **`cli`**: argument parsing and the `run` entry point
//! - **`commands`**: the subcommands, runnable against any input/output pair

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, run};
pub use commands::{CommandStatus, Session, execute};
