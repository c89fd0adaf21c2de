//! Model boundary: prompt construction, the Ollama client and recovery of a
//! structured [`AnalysisResult`] from whatever text comes back.

mod client;
pub mod normalize;
pub mod prompts;

pub use client::{LlmError, OllamaClient, PromptSender};
pub use normalize::{normalize, normalize_with_stage, RecoveryStage};

use crate::classify::FailureType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured diagnosis recovered from the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    #[serde(default)]
    pub remediations: Vec<String>,
    #[serde(default)]
    pub patch: String,
    /// Attached by the caller after classification, never by the normalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<FailureType>,
}

impl AnalysisResult {
    pub fn new(summary: impl Into<String>, remediations: &[&str], patch: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            remediations: remediations.iter().map(|s| s.to_string()).collect(),
            patch: patch.into(),
            failure_type: None,
        }
    }

    /// Build a result from a parsed JSON object. Field names match
    /// case-insensitively and missing fields come back empty.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let remediations = match field(obj, "remediations") {
            Some(Value::Array(items)) => items.iter().map(value_text).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![value_text(other)],
        };

        Some(Self {
            summary: field(obj, "summary").map(value_text).unwrap_or_default(),
            remediations,
            patch: field(obj, "patch").map(value_text).unwrap_or_default(),
            failure_type: None,
        })
    }
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).or_else(|| {
        obj.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
