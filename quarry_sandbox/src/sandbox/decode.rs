//! Single-level percent decoding for candidate paths.
//!
//! Decoding lets a file legitimately named with URL escapes (`file%20name.txt`)
//! stay reachable. Anything that still looks encoded after one pass is reported
//! as suspicious rather than decoded again.

use std::sync::LazyLock;

use regex::Regex;

/// Encoded dot-dot in any spelling (`%2e%2e`, `.%2e`, `%2e.`), case-insensitive.
static ENCODED_DOT_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(%2e%2e|\.%2e|%2e\.)").expect("valid regex"));

/// Residual encoded `.`, `/`, `\` or `~` after one decoding pass.
static RESIDUAL_TRAVERSAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%(2e|2f|5c|7e)").expect("valid regex"));

/// Residual encoded control byte (0x00-0x1F, 0x7F) after one decoding pass.
static RESIDUAL_CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%([01][0-9a-f]|7f)").expect("valid regex"));

/// What a decoding pass found besides the decoded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Suspicion {
    None,
    /// Encoded or double-encoded traversal markers.
    Traversal,
    /// A control byte hidden behind a second layer of encoding.
    EncodedControl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Decoded {
    pub text: String,
    pub suspicion: Suspicion,
}

/// Decode `raw` once. Returns `None` when the decoded bytes are not UTF-8.
pub(super) fn decode_candidate(raw: &str) -> Option<Decoded> {
    if !raw.contains('%') {
        return Some(Decoded {
            text: raw.to_string(),
            suspicion: Suspicion::None,
        });
    }

    let text = percent_decode_lossless(raw)?;

    let suspicion = if ENCODED_DOT_DOT.is_match(raw) || RESIDUAL_TRAVERSAL.is_match(&text) {
        Suspicion::Traversal
    } else if RESIDUAL_CONTROL.is_match(&text) {
        Suspicion::EncodedControl
    } else {
        Suspicion::None
    };

    Some(Decoded { text, suspicion })
}

/// Percent-decode, keeping malformed triplets (`100%.txt`) as literal text.
fn percent_decode_lossless(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2]))
        {
            out.push((hi << 4) | lo);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).ok()
}

fn hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
