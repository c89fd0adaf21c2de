//! One diagnosis run: extract → classify → prompt → model → normalize → merge.
//!
//! Model failures never escape [`Diagnoser::run`]; they are turned into
//! advisory results so the caller always has something to print.

use crate::classify::classify;
use crate::config::Config;
use crate::extract::{extract, ParsedLog};
use crate::llm::prompts::{analysis_prompt, build_context};
use crate::llm::{normalize_with_stage, AnalysisResult, LlmError, PromptSender, RecoveryStage};

/// Everything produced for one log.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub parsed: ParsedLog,
    pub analysis: AnalysisResult,
    /// How the model output was recovered; `None` when the call itself failed.
    pub stage: Option<RecoveryStage>,
}

pub struct Diagnoser<S> {
    sender: S,
    max_lines: usize,
    context_chars: usize,
}

impl<S: PromptSender> Diagnoser<S> {
    pub fn new(sender: S, config: &Config) -> Self {
        Self {
            sender,
            max_lines: config.max_lines,
            context_chars: config.context_chars,
        }
    }

    pub async fn run(&self, log: &str) -> Diagnosis {
        let parsed = extract(log, self.max_lines);
        let failure_type = classify(&parsed.top_error);
        let context = build_context(failure_type, &parsed.snippet, self.context_chars);
        let prompt = analysis_prompt(&parsed.top_error, &context);

        let (mut analysis, stage) = match self.sender.send_prompt(&prompt).await {
            Ok(text) => {
                let (result, stage) = normalize_with_stage(&text);
                (result, Some(stage))
            }
            Err(err) => {
                tracing::warn!(error = %err, "model call failed, using advisory result");
                (advisory_for(&err), None)
            }
        };
        analysis.failure_type = Some(failure_type);

        Diagnosis {
            parsed,
            analysis,
            stage,
        }
    }
}

/// Fixed best-effort result for a failed model call.
pub fn advisory_for(err: &LlmError) -> AnalysisResult {
    match err {
        LlmError::Timeout { secs } => AnalysisResult::new(
            format!(
                "LLM analysis timed out after {} seconds - try a smaller context or check system resources",
                secs
            ),
            &["Try freeing up system memory", "Consider restarting Ollama service"],
            "",
        ),
        LlmError::Unreachable { endpoint } => AnalysisResult::new(
            format!("Could not reach the model service at {}", endpoint),
            &["Check if Ollama is running", "Verify the endpoint URL"],
            "",
        ),
        other => AnalysisResult::new(
            format!("LLM error: {}", other),
            &["Check if Ollama is running", "Verify the model is available"],
            "",
        ),
    }
}
