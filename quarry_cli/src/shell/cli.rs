//! # quarry command line
//!
//! Argument definitions and the process entry point.

use super::commands::{CommandStatus, Session, execute};
use crate::config::{Overrides, Settings};
use crate::exit;
use crate::inputs::DEFAULT_CONCURRENCY;
use crate::utils::logging::init_logging;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// quarry: sandboxed access to query inputs, URL lists, schemas and exports.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = "Every PATH is checked against the sandbox roots before it is touched.

Roots come from --sandbox-scope, then QUARRY_SANDBOX_SCOPE, then the
[sandbox] section of the config file, then the working directory.

Examples:
  quarry --sandbox-scope ./research queries research/weekly.txt
  quarry json session.json --schema schemas/session.json
  echo '{\"id\": 1}' | quarry export out/session.json --parents"
)]
pub struct Cli {
    /// Sandbox root directory (repeatable)
    #[arg(long = "sandbox-scope", global = true, value_name = "DIR")]
    pub sandbox_scope: Vec<PathBuf>,

    /// Size cap in bytes for every read and write
    #[arg(long, global = true, value_name = "BYTES")]
    pub max_file_size: Option<u64>,

    /// Config file (default: $QUARRY_CONFIG, then ./quarry.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log to stderr instead of file
    #[arg(long, global = true)]
    pub log_to_stderr: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Validate paths and print their canonical form
    Check {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Write stdin to a file
    Put {
        path: String,
        /// Create missing parent directories
        #[arg(long)]
        parents: bool,
    },
    /// List the entries of a directory
    Ls { path: String },
    /// Show size, type and modification time
    Stat {
        path: String,
        #[arg(long)]
        json: bool,
    },
    /// Print whether a path exists (exit status 1 if not)
    Exists { path: String },
    /// Print a JSON document, optionally checked against a JSON Schema file
    Json {
        path: String,
        #[arg(long, value_name = "SCHEMA")]
        schema: Option<String>,
    },
    /// Load query-input files (one query per line, `#` comments)
    Queries {
        #[arg(required = true)]
        paths: Vec<String>,
        /// Print files and their queries as JSON
        #[arg(long)]
        json: bool,
        /// Files loaded at once
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Load and check a list of http(s) URLs
    Urls { path: String },
    /// Write a JSON document read from stdin
    Export {
        dest: String,
        /// Create missing parent directories
        #[arg(long)]
        parents: bool,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Check { .. } => "check",
            Commands::Cat { .. } => "cat",
            Commands::Put { .. } => "put",
            Commands::Ls { .. } => "ls",
            Commands::Stat { .. } => "stat",
            Commands::Exists { .. } => "exists",
            Commands::Json { .. } => "json",
            Commands::Queries { .. } => "queries",
            Commands::Urls { .. } => "urls",
            Commands::Export { .. } => "export",
        }
    }
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            sandbox_scope: self.sandbox_scope.clone(),
            max_file_size: self.max_file_size,
            config: self.config.clone(),
            debug: self.debug,
            log_to_stderr: self.log_to_stderr,
        }
    }
}

/// Parse arguments, run one command and report failures on stderr.
///
/// Usage errors exit with status 2 from inside `clap`.
pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    match run_cli(cli).await {
        Ok(status) => status.into(),
        Err(err) => {
            let rendered = exit::render(&err);
            tracing::warn!(exit_code = exit::exit_code(&err), "{rendered}");
            eprintln!("{rendered}");
            ExitCode::from(exit::exit_code(&err))
        }
    }
}

async fn run_cli(cli: Cli) -> Result<CommandStatus> {
    let cwd = std::env::current_dir().context("Failed to get current working directory")?;
    let settings = Settings::resolve(&cli.overrides(), |key| std::env::var(key).ok(), &cwd)?;

    init_logging(&settings.log_level, settings.log_to_file)?;
    if let Some(path) = &settings.config_path {
        tracing::debug!(config = %path.display(), "loaded config file");
    }

    let session = Session::from_settings(&settings)?;
    tracing::info!(roots = ?session.sandbox().roots(), "sandbox ready");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut input = stdin.lock();
    let mut output = stdout.lock();
    let status = execute(&cli.command, &session, &mut input, &mut output).await?;
    std::io::Write::flush(&mut output)?;
    Ok(status)
}
