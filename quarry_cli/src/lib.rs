//! # quarry_cli
//!
//! The `quarry` command-line client's file-facing half: it resolves
//! configuration, builds one [`quarry_sandbox::Sandbox`] and routes every
//! subcommand's file access through it.

pub mod config;
pub mod exit;
pub mod inputs;
pub mod retry;
pub mod shell;
pub mod utils;
