//! Output metadata extraction: scan captured Claude CLI output for the
//! session log reference, request id, and closing summary.
//!
//! Recognized markers:
//! - `📄 Session log: /path/to/2025-01-17_10-30-45_abc123.jsonl`
//! - `Request ID: abc123`
//! - `Summary: <text>` up to a `───` rule line or end of input
//!
//! Each marker is searched independently and only its first occurrence counts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Session log reference. The directory prefix is consumed lazily, so the
/// first `<name>.<ext>` segment on the marker line is captured.
static LOG_FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Session log: (?:\S*?/)?([^/\s]+\.\w+)").unwrap());

static REQUEST_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Request ID: (\S+)").unwrap());

/// Summary body runs across lines until the first horizontal rule.
static SUMMARY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Summary: (.+?)(?:─{3,}|\z)").unwrap());

/// Structured view of one captured output block.
///
/// `content` is always the input verbatim. The optional fields are either
/// absent or a non-empty, trimmed string; absent fields are left out of the
/// serialized JSON rather than written as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ExtractionResult {
    /// True when at least one metadata field was found.
    pub fn has_metadata(&self) -> bool {
        self.summary.is_some() || self.log_file_name.is_some() || self.request_id.is_some()
    }
}

/// Extract metadata from captured output. Total over all inputs.
pub fn extract(content: &str) -> ExtractionResult {
    let result = ExtractionResult {
        content: content.to_string(),
        summary: first_capture(&SUMMARY_PATTERN, content),
        log_file_name: first_capture(&LOG_FILE_PATTERN, content),
        request_id: first_capture(&REQUEST_ID_PATTERN, content),
    };

    tracing::trace!(
        bytes = content.len(),
        summary = result.summary.is_some(),
        log_file_name = ?result.log_file_name,
        request_id = ?result.request_id,
        "extracted output metadata"
    );

    result
}

/// Extract from raw bytes, replacing invalid UTF-8 (garbled terminal
/// sequences) with U+FFFD first.
pub fn extract_bytes(raw: &[u8]) -> ExtractionResult {
    extract(&String::from_utf8_lossy(raw))
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    let captured = pattern.captures(text)?.get(1)?.as_str().trim();
    if captured.is_empty() {
        None
    } else {
        Some(captured.to_string())
    }
}
