use crate::classify::FailureType;
use crate::util::take_chars;

/// Instruction sent to the model for one failure.
pub fn analysis_prompt(error_line: &str, failure_context: &str) -> String {
    format!(
        r#"Analyze this CI failure and respond with EXACTLY this JSON structure:

ERROR: {error_line}
CONTEXT: {failure_context}

RESPOND WITH ONLY VALID JSON IN THIS EXACT FORMAT:
{{
    "summary": "one sentence explaining what failed",
    "remediations": [
        "specific command or action to fix this"
    ],
    "patch": "name: CI\non: [push]\njobs:\n  test:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: actions/checkout@v4"
}}

RULES:
1. Keep "summary" to ONE clear sentence
2. "remediations" must be specific actionable commands
3. "patch" must be valid YAML on a single line with \n for newlines
4. NO nested objects, NO extra fields
5. Focus on the specific error shown"#
    )
}

/// Context block handed to [`analysis_prompt`]: the category plus the head of
/// the snippet, capped at `max_chars`.
pub fn build_context(failure_type: FailureType, snippet: &str, max_chars: usize) -> String {
    format!(
        "Failure type: {}\nLog context: {}",
        failure_type,
        take_chars(snippet, max_chars)
    )
}
