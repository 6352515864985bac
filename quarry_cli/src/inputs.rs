//! Query-input files and URL lists.
//!
//! Both formats are plain text, one entry per line. Lines are trimmed; blank
//! lines and lines starting with `#` are skipped. Every file is read through
//! the sandbox on the blocking pool, with transient failures retried.

use crate::retry::{RetryConfig, execute_with_retry};
use futures::{StreamExt, TryStreamExt, stream};
use quarry_sandbox::{FileSystemError, Sandbox};
use serde::Serialize;
use std::fmt;
use url::Url;

/// Files loaded at once by [`load_queries`] when the caller does not say.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("{path}: {} invalid URL line(s): {}", .lines.len(), join_lines(.lines))]
    InvalidUrls {
        path: String,
        lines: Vec<InvalidUrlLine>,
    },
    #[error("failed to read standard input: {0}")]
    Stdin(#[source] std::io::Error),
}

/// A URL-list line that was rejected, with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidUrlLine {
    pub line: usize,
    pub text: String,
    pub reason: String,
}

impl fmt::Display for InvalidUrlLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({:?})", self.line, self.reason, self.text)
    }
}

fn join_lines(lines: &[InvalidUrlLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Queries from one file, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFile {
    pub path: String,
    pub queries: Vec<String>,
}

/// Meaningful lines with their 1-based line numbers.
pub fn entry_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

pub fn parse_queries(text: &str) -> Vec<String> {
    entry_lines(text).map(|(_, line)| line.to_string()).collect()
}

/// Parse a URL list, keeping only `http` and `https` URLs. All bad lines are
/// reported, not just the first.
pub fn parse_urls(text: &str) -> Result<Vec<Url>, Vec<InvalidUrlLine>> {
    let mut urls = Vec::new();
    let mut invalid = Vec::new();

    for (line, entry) in entry_lines(text) {
        let reject = |reason: String| InvalidUrlLine {
            line,
            text: entry.to_string(),
            reason,
        };
        match Url::parse(entry) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => urls.push(url),
            Ok(url) => invalid.push(reject(format!("unsupported scheme '{}'", url.scheme()))),
            Err(e) => invalid.push(reject(e.to_string())),
        }
    }

    if invalid.is_empty() {
        Ok(urls)
    } else {
        Err(invalid)
    }
}

/// Run a sandbox operation on the blocking pool.
pub async fn run_blocking<T, F>(sandbox: &Sandbox, op: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Sandbox) -> Result<T, FileSystemError> + Send + 'static,
{
    let sandbox = sandbox.clone();
    let result = tokio::task::spawn_blocking(move || op(&sandbox)).await?;
    Ok(result?)
}

/// Read a UTF-8 input file through the sandbox, retrying transient failures.
pub async fn read_text(sandbox: &Sandbox, path: &str, retry: &RetryConfig) -> anyhow::Result<String> {
    execute_with_retry(retry, path, || {
        let path = path.to_string();
        async move { run_blocking(sandbox, move |s| s.read_to_string(&path)).await }
    })
    .await
}

/// Load several query files, at most `concurrency` at a time. Results keep
/// the order of `paths`; the first failure aborts the load.
pub async fn load_queries(
    sandbox: &Sandbox,
    paths: &[String],
    retry: &RetryConfig,
    concurrency: usize,
) -> anyhow::Result<Vec<QueryFile>> {
    stream::iter(paths.iter().cloned())
        .map(|path| async move {
            let text = read_text(sandbox, &path, retry).await?;
            let queries = parse_queries(&text);
            tracing::debug!(path = %path, count = queries.len(), "loaded query file");
            Ok::<_, anyhow::Error>(QueryFile { path, queries })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

pub async fn load_urls(
    sandbox: &Sandbox,
    path: &str,
    retry: &RetryConfig,
) -> anyhow::Result<Vec<Url>> {
    let text = read_text(sandbox, path, retry).await?;
    let urls = parse_urls(&text).map_err(|lines| InputError::InvalidUrls {
        path: path.to_string(),
        lines,
    })?;
    tracing::debug!(path, count = urls.len(), "loaded URL list");
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# saved searches\n\n  rust sandboxing  \n\t\n#not this\nsymlink races\n";
        assert_eq!(parse_queries(text), vec!["rust sandboxing", "symlink races"]);
    }

    #[test]
    fn entry_lines_keep_original_numbers() {
        let lines: Vec<_> = entry_lines("# a\n\nfirst\n# b\nsecond").collect();
        assert_eq!(lines, vec![(3, "first"), (5, "second")]);
    }

    #[test]
    fn crlf_line_endings_are_handled() {
        assert_eq!(parse_queries("one\r\ntwo\r\n"), vec!["one", "two"]);
    }

    #[test]
    fn urls_accept_only_http_schemes() {
        let text = "https://example.com/a\n# skip\nhttp://example.org\n";
        let urls = parse_urls(text).unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].host_str(), Some("example.com"));
    }

    #[test]
    fn every_bad_url_line_is_reported() {
        let text = "https://ok.example\nftp://files.example\n\nnot a url\n";
        let invalid = parse_urls(text).unwrap_err();
        assert_eq!(invalid.len(), 2);
        assert_eq!(invalid[0].line, 2);
        assert!(invalid[0].reason.contains("ftp"));
        assert_eq!(invalid[1].line, 4);
        assert_eq!(invalid[1].text, "not a url");
    }

    #[test]
    fn invalid_urls_error_lists_lines() {
        let err = InputError::InvalidUrls {
            path: "urls.txt".into(),
            lines: parse_urls("bad one\nmailto:x@example.com").unwrap_err(),
        };
        let shown = err.to_string();
        assert!(shown.starts_with("urls.txt: 2 invalid URL line(s)"));
        assert!(shown.contains("line 1"));
        assert!(shown.contains("line 2: unsupported scheme 'mailto'"));
    }
}
