//! Recovery of an [`AnalysisResult`] from unreliable model output.
//!
//! Small local models wrap their JSON in fences, chat around it, or put real
//! newlines inside the `patch` string. [`normalize`] runs a cascade of
//! increasingly permissive strategies and always returns a result:
//!
//! 1. strip fences and trim to the outermost braces
//! 2. strict parse, then parse after common repairs
//! 3. re-escape the raw `patch` value and parse again
//! 4. parse the first flat object that mentions an expected field
//! 5. scrape fields with patterns
//! 6. fall back to a truncated copy of the raw text

mod scan;

use super::AnalysisResult;
use crate::util::take_chars;
use regex::Regex;
use scan::{escape_raw_field, scan_string_end, unescape_field};
use std::sync::OnceLock;

const LAST_RESORT_CHARS: usize = 200;

const SCRAPE_FALLBACK_REMEDIATIONS: &[&str] = &["Fix the identified issue", "Improve CI pipeline"];
const SCRAPE_FALLBACK_PATCH: &str = "# Add caching for faster builds";
const LAST_RESORT_REMEDIATIONS: &[&str] = &["Review the full response", "Check the specific error"];
const LAST_RESORT_PATCH: &str = "# Add appropriate caching";

/// Which cascade stage produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    Direct,
    Repaired,
    FieldReescape,
    TargetedObject,
    FieldScrape,
    LastResort,
}

impl RecoveryStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStage::Direct => "direct",
            RecoveryStage::Repaired => "repaired",
            RecoveryStage::FieldReescape => "field_reescape",
            RecoveryStage::TargetedObject => "targeted_object",
            RecoveryStage::FieldScrape => "field_scrape",
            RecoveryStage::LastResort => "last_resort",
        }
    }
}

/// Recover a structured result from raw model text. Never fails.
pub fn normalize(raw: &str) -> AnalysisResult {
    normalize_with_stage(raw).0
}

/// Like [`normalize`], also reporting which stage succeeded.
pub fn normalize_with_stage(raw: &str) -> (AnalysisResult, RecoveryStage) {
    let (result, stage) = run_cascade(raw);
    tracing::debug!(stage = stage.as_str(), "recovered analysis from model output");
    (result, stage)
}

fn run_cascade(raw: &str) -> (AnalysisResult, RecoveryStage) {
    let cleaned = strip_to_object(raw);

    if let Some(result) = parse_object(cleaned) {
        return (result, RecoveryStage::Direct);
    }

    let repaired = fix_json_issues(cleaned);
    if repaired != cleaned {
        if let Some(result) = parse_object(&repaired) {
            return (result, RecoveryStage::Repaired);
        }
    }

    if let Some(result) = reescape_patch_field(cleaned) {
        return (result, RecoveryStage::FieldReescape);
    }

    if let Some(result) = targeted_object(cleaned) {
        return (result, RecoveryStage::TargetedObject);
    }

    if let Some(result) = scrape_fields(cleaned) {
        return (result, RecoveryStage::FieldScrape);
    }

    (last_resort(raw), RecoveryStage::LastResort)
}

/// Strip markdown code fences from a response
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(without_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening fence line.
    let body = match without_open.find('\n') {
        Some(newline) if !without_open[..newline].contains('{') => &without_open[newline + 1..],
        _ => without_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Extract a JSON fragment between matching delimiters
fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

fn strip_to_object(raw: &str) -> &str {
    let clean = strip_markdown_fences(raw);
    extract_json_fragment(clean, '{', '}').unwrap_or(clean)
}

fn parse_object(text: &str) -> Option<AnalysisResult> {
    let value = serde_json::from_str::<serde_json::Value>(text).ok()?;
    AnalysisResult::from_value(&value)
}

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([\]}])").expect("valid trailing comma regex"))
}

/// Try to fix common JSON issues from LLM responses
fn fix_json_issues(json: &str) -> String {
    // Remove trailing commas before ] or }
    let fixed = trailing_comma_re().replace_all(json, "$1");

    // Smart quotes to regular quotes
    let fixed = fixed
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // Remove any control characters that might have slipped in
    fixed
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

fn patch_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""patch"\s*:\s*""#).expect("valid patch marker regex"))
}

/// Re-escape the raw `patch` value in place, reparse, then turn the escapes
/// back into real characters on that one field.
fn reescape_patch_field(text: &str) -> Option<AnalysisResult> {
    let content_start = patch_marker_re().find(text)?.end();
    let content_end = content_start + scan_string_end(&text[content_start..])?;

    let escaped = escape_raw_field(&text[content_start..content_end]);
    let fixed = format!("{}{}{}", &text[..content_start], escaped, &text[content_end..]);

    let mut result = parse_object(&fixed)?;
    result.patch = unescape_field(&result.patch);
    Some(result)
}

fn flat_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)\{[^{}]*(?:"summary"|"remediations"|"patch")[^{}]*\}"#)
            .expect("valid flat object regex")
    })
}

/// First brace span without nested braces that names an expected field and parses.
fn targeted_object(text: &str) -> Option<AnalysisResult> {
    flat_object_re()
        .find_iter(text)
        .find_map(|m| parse_object(m.as_str()))
}

fn summary_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)"summary"\s*:\s*"([^"]*)""#).expect("valid summary regex"))
}

fn patch_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)"patch"\s*:\s*"([^"]*)""#).expect("valid patch regex"))
}

fn remediations_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)"remediations"\s*:\s*\[([^\]]*)\]"#).expect("valid remediations regex")
    })
}

fn quoted_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("valid quoted item regex"))
}

/// Pull fields out one by one. Only succeeds when the summary is recoverable.
fn scrape_fields(text: &str) -> Option<AnalysisResult> {
    let summary = summary_field_re().captures(text)?.get(1)?.as_str().trim().to_string();

    let remediations: Vec<String> = remediations_field_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|list| {
            quoted_item_re()
                .captures_iter(list.as_str())
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let patch = patch_field_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape_field(m.as_str()))
        .unwrap_or_else(|| SCRAPE_FALLBACK_PATCH.to_string());

    let mut result = AnalysisResult::new(summary, SCRAPE_FALLBACK_REMEDIATIONS, patch);
    if !remediations.is_empty() {
        result.remediations = remediations;
    }
    Some(result)
}

fn last_resort(raw: &str) -> AnalysisResult {
    let trimmed = raw.trim();
    let summary = if trimmed.is_empty() {
        "Analysis: the model returned an empty response".to_string()
    } else if trimmed.chars().count() > LAST_RESORT_CHARS {
        format!("Analysis: {}...", take_chars(trimmed, LAST_RESORT_CHARS))
    } else {
        format!("Analysis: {}", trimmed)
    };
    AnalysisResult::new(summary, LAST_RESORT_REMEDIATIONS, LAST_RESORT_PATCH)
}
