//! Shared harness for driving `quarry` subcommands in-process.
#![allow(dead_code)]

use anyhow::Result;
use clap::Parser;
use quarry_cli::retry::RetryConfig;
use quarry_cli::shell::{Cli, CommandStatus, Session, execute};
use quarry_sandbox::{DEFAULT_MAX_FILE_SIZE, Sandbox};
use std::path::PathBuf;
use tempfile::TempDir;

pub struct Harness {
    _temp: TempDir,
    pub root: PathBuf,
    pub outside: PathBuf,
    pub session: Session,
}

/// What a command printed and how it ended.
pub struct Run {
    pub result: Result<CommandStatus>,
    pub stdout: String,
}

impl Run {
    pub fn exit_code(&self) -> u8 {
        match &self.result {
            Ok(CommandStatus::Success) => quarry_cli::exit::SUCCESS,
            Ok(CommandStatus::Negative) => quarry_cli::exit::FAILURE,
            Err(err) => quarry_cli::exit::exit_code(err),
        }
    }
}

impl Harness {
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
        let retry = RetryConfig::immediate(2);
        Self {
            _temp: temp,
            root,
            outside,
            session: Session::new(sandbox, retry),
        }
    }

    pub fn path(&self, relative: &str) -> String {
        format!("{}/{}", self.root.display(), relative)
    }

    pub fn write_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parents");
        }
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    /// Parse `args` as `quarry <args...>` and execute with `stdin` as input.
    pub async fn run(&self, args: &[&str], stdin: &[u8]) -> Run {
        let cli = Cli::try_parse_from(std::iter::once("quarry").chain(args.iter().copied()))
            .expect("arguments should parse");
        let mut input = stdin;
        let mut output = Vec::new();
        let result = execute(&cli.command, &self.session, &mut input, &mut output).await;
        Run {
            result,
            stdout: String::from_utf8_lossy(&output).into_owned(),
        }
    }
}
