//! Subcommand implementations.
//!
//! `execute` takes its input and output streams as arguments so every
//! command can be driven from tests without spawning the binary. Sandbox
//! calls run on the blocking pool via [`run_blocking`].

use super::cli::Commands;
use crate::config::Settings;
use crate::inputs::{self, InputError, run_blocking};
use crate::retry::RetryConfig;
use anyhow::Result;
use quarry_sandbox::{
    FileStat, FileSystemError, FsErrorKind, Sandbox, SchemaValidator, WriteOptions, parse_json,
    sandbox::escape_path,
};
use std::io::{Read, Write};
use std::process::ExitCode;

/// Stands in for a path in errors about data read from stdin.
const STDIN_ORIGIN: &str = "<stdin>";

/// Everything a command needs: the sandbox and the retry policy for input
/// loading.
#[derive(Debug, Clone)]
pub struct Session {
    sandbox: Sandbox,
    retry: RetryConfig,
}

impl Session {
    pub fn new(sandbox: Sandbox, retry: RetryConfig) -> Self {
        Self { sandbox, retry }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, FileSystemError> {
        let sandbox = Sandbox::new(settings.roots.clone(), settings.max_file_size)?;
        Ok(Self::new(sandbox, settings.retry.clone()))
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }
}

/// Outcome of a command that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// The command ran but the answer is "no" (`exists` on an absent path).
    Negative,
}

impl From<CommandStatus> for ExitCode {
    fn from(status: CommandStatus) -> Self {
        match status {
            CommandStatus::Success => ExitCode::from(crate::exit::SUCCESS),
            CommandStatus::Negative => ExitCode::from(crate::exit::FAILURE),
        }
    }
}

pub async fn execute(
    command: &Commands,
    session: &Session,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<CommandStatus> {
    tracing::debug!(command = command.name(), "running command");
    let sandbox = session.sandbox();

    match command {
        Commands::Check { paths } => check(sandbox, paths, output).await,
        Commands::Cat { path } => {
            let path = path.clone();
            let bytes = run_blocking(sandbox, move |s| s.read(&path)).await?;
            output.write_all(&bytes)?;
            Ok(CommandStatus::Success)
        }
        Commands::Put { path, parents } => {
            let contents = read_bounded(input, sandbox.max_file_size())?;
            let (path, options) = (path.clone(), write_options(*parents));
            run_blocking(sandbox, move |s| s.write(&path, &contents, options)).await?;
            Ok(CommandStatus::Success)
        }
        Commands::Ls { path } => {
            let path = path.clone();
            let names = run_blocking(sandbox, move |s| s.list(&path)).await?;
            for name in names {
                writeln!(output, "{}", escape_path(&name))?;
            }
            Ok(CommandStatus::Success)
        }
        Commands::Stat { path, json } => {
            let path = path.clone();
            let stat = run_blocking(sandbox, move |s| s.stat(&path)).await?;
            if *json {
                writeln!(output, "{}", serde_json::to_string_pretty(&stat)?)?;
            } else {
                write_stat(&stat, output)?;
            }
            Ok(CommandStatus::Success)
        }
        Commands::Exists { path } => {
            let path = path.clone();
            let exists = run_blocking(sandbox, move |s| Ok(s.exists(&path))).await?;
            writeln!(output, "{exists}")?;
            Ok(if exists {
                CommandStatus::Success
            } else {
                CommandStatus::Negative
            })
        }
        Commands::Json { path, schema } => {
            let (path, schema) = (path.clone(), schema.clone());
            let document = run_blocking(sandbox, move |s| {
                let schema = schema.as_deref().map(|p| s.load_schema(p)).transpose()?;
                s.read_json(&path, schema.as_ref().map(|v| v as &dyn SchemaValidator))
            })
            .await?;
            writeln!(output, "{}", serde_json::to_string_pretty(&document)?)?;
            Ok(CommandStatus::Success)
        }
        Commands::Queries {
            paths,
            json,
            concurrency,
        } => {
            let files = inputs::load_queries(sandbox, paths, &session.retry, *concurrency).await?;
            if *json {
                writeln!(output, "{}", serde_json::to_string_pretty(&files)?)?;
            } else {
                for query in files.iter().flat_map(|file| &file.queries) {
                    writeln!(output, "{query}")?;
                }
            }
            Ok(CommandStatus::Success)
        }
        Commands::Urls { path } => {
            for url in inputs::load_urls(sandbox, path, &session.retry).await? {
                writeln!(output, "{url}")?;
            }
            Ok(CommandStatus::Success)
        }
        Commands::Export { dest, parents } => {
            let bytes = read_bounded(input, sandbox.max_file_size())?;
            if bytes.len() as u64 > sandbox.max_file_size() {
                return Err(FileSystemError::new(
                    FsErrorKind::ContentTooLarge,
                    dest.as_str(),
                    format!(
                        "input exceeds the {} byte limit",
                        sandbox.max_file_size()
                    ),
                )
                .into());
            }
            let text = String::from_utf8(bytes).map_err(|_| {
                FileSystemError::new(
                    FsErrorKind::JsonParseError,
                    STDIN_ORIGIN,
                    "input is not valid UTF-8",
                )
            })?;
            let document = parse_json(&text, STDIN_ORIGIN)?;

            let (dest, options) = (dest.clone(), write_options(*parents));
            run_blocking(sandbox, move |s| s.write_json(&dest, &document, options)).await?;
            Ok(CommandStatus::Success)
        }
    }
}

/// Prints `<path>\t<canonical>` or `<path>\terror[CODE]` per argument and
/// fails with the first rejection.
async fn check(sandbox: &Sandbox, paths: &[String], output: &mut dyn Write) -> Result<CommandStatus> {
    let candidates = paths.to_vec();
    let results = run_blocking(sandbox, move |s| {
        Ok(candidates
            .iter()
            .map(|p| s.validate(p))
            .collect::<Vec<_>>())
    })
    .await?;

    let mut first_failure = None;
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(canonical) => writeln!(output, "{}\t{}", escape_path(path), canonical.display())?,
            Err(err) => {
                writeln!(output, "{}\terror[{}]", err.display_path(), err.kind().code())?;
                tracing::warn!(code = err.kind().code(), path = %err.display_path(), "path rejected");
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }
    }

    match first_failure {
        Some(err) => Err(err.into()),
        None => Ok(CommandStatus::Success),
    }
}

/// Reads at most `limit + 1` bytes so an oversized input is detectable
/// without buffering all of it.
fn read_bounded(input: &mut dyn Read, limit: u64) -> Result<Vec<u8>, InputError> {
    let mut buffer = Vec::new();
    input
        .take(limit.saturating_add(1))
        .read_to_end(&mut buffer)
        .map_err(InputError::Stdin)?;
    Ok(buffer)
}

fn write_options(parents: bool) -> WriteOptions {
    WriteOptions::new().with_create_parents(parents)
}

fn write_stat(stat: &FileStat, output: &mut dyn Write) -> std::io::Result<()> {
    let kind = if stat.is_directory { "directory" } else { "file" };
    let modified = stat
        .last_modified
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    writeln!(output, "size: {}", stat.size)?;
    writeln!(output, "type: {kind}")?;
    writeln!(output, "modified: {modified}")
}
