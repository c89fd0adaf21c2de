//! Failure extraction from raw CI logs.
//!
//! A single pass over the trimmed log produces a bounded tail snippet, the
//! first `##[error]` annotation and the line most likely to be the real error.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Default number of tail lines kept as context.
pub const DEFAULT_MAX_LINES: usize = 200;

/// Reported as `top_error` when the log has no lines at all.
pub const NO_ERROR_SENTINEL: &str = "No error lines found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedLog {
    /// Text following the first `##[error]` annotation.
    pub failing_step: Option<String>,
    /// Last `max_lines` lines of the log, newline-joined.
    pub snippet: String,
    /// Best guess at the line carrying the actual error message.
    pub top_error: String,
}

fn error_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"##\[error\]([^\n]+)").expect("valid error marker regex"))
}

/// `RuntimeError:`, `ValueError:`, `ModuleNotFoundError:` and friends.
fn exception_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z][A-Za-z0-9_]*Error:").expect("valid exception prefix regex")
    })
}

fn trailing_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":\s*\w+$").expect("valid trailing word regex"))
}

fn is_candidate(line: &str) -> bool {
    line.contains("ERROR")
        || line.contains("Traceback")
        || line.contains("Exception")
        || exception_prefix_re().is_match(line)
}

/// Extract the failure signal from `log`, keeping at most `max_lines` tail lines.
///
/// A `max_lines` of zero is treated as one so a non-empty log never yields an
/// empty snippet.
pub fn extract(log: &str, max_lines: usize) -> ParsedLog {
    let lines: Vec<&str> = log.trim().lines().collect();
    let keep = max_lines.max(1);
    let snippet = lines[lines.len().saturating_sub(keep)..].join("\n");

    let failing_step = error_marker_re()
        .captures(log)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    let last_candidate = lines.iter().rev().copied().find(|l| is_candidate(l));
    let top_error = match last_candidate {
        Some(last) if last.trim_start().starts_with("Traceback") => {
            resolve_traceback(&lines).unwrap_or(last)
        }
        Some(last) => last,
        None => lines.last().copied().unwrap_or(NO_ERROR_SENTINEL),
    };
    let top_error = top_error.trim().to_string();

    tracing::debug!(
        lines = lines.len(),
        failing_step = ?failing_step,
        top_error = %top_error,
        "extracted failure signal"
    );

    ParsedLog {
        failing_step,
        snippet,
        top_error,
    }
}

/// Walk back from the end of the log looking for the exception message that
/// a traceback header points at.
fn resolve_traceback<'a>(lines: &[&'a str]) -> Option<&'a str> {
    lines
        .iter()
        .rev()
        .find(|l| trailing_word_re().is_match(l) || exception_prefix_re().is_match(l))
        .copied()
}
