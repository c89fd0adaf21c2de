//! Rendering of a finished diagnosis for stdout.

use crate::diagnose::Diagnosis;
use crate::llm::AnalysisResult;
use std::fmt::Write;

/// Pretty JSON (2-space indent) of the merged analysis.
pub fn render_json(analysis: &AnalysisResult) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(analysis)?)
}

/// Human-readable report.
pub fn render_text(diagnosis: &Diagnosis) -> String {
    let analysis = &diagnosis.analysis;
    let mut out = String::new();

    let kind = analysis
        .failure_type
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unclassified".to_string());
    let _ = writeln!(out, "CI failure diagnosis ({})", kind);
    let _ = writeln!(out);
    let _ = writeln!(out, "Top error:");
    let _ = writeln!(out, "  {}", diagnosis.parsed.top_error);
    if let Some(step) = &diagnosis.parsed.failing_step {
        let _ = writeln!(out, "Failing step:");
        let _ = writeln!(out, "  {}", step);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "  {}", analysis.summary);
    let _ = writeln!(out);
    let _ = writeln!(out, "Remediations:");
    if analysis.remediations.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for (i, remediation) in analysis.remediations.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, remediation);
    }
    if !analysis.patch.trim().is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Suggested patch:");
        for line in analysis.patch.lines() {
            let _ = writeln!(out, "    {}", line);
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FailureType;
    use crate::extract::ParsedLog;

    fn sample(patch: &str, remediations: Vec<String>) -> Diagnosis {
        Diagnosis {
            parsed: ParsedLog {
                failing_step: Some("Run pytest".to_string()),
                snippet: "...".to_string(),
                top_error: "RuntimeError: boom".to_string(),
            },
            analysis: AnalysisResult {
                summary: "The script raised an exception.".to_string(),
                remediations,
                patch: patch.to_string(),
                failure_type: Some(FailureType::TestFailure),
            },
            stage: None,
        }
    }

    #[test]
    fn test_render_json_shape() {
        let diagnosis = sample("a: 1\nb: 2", vec!["retry".to_string()]);
        let json = render_json(&diagnosis.analysis).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"], "The script raised an exception.");
        assert_eq!(value["remediations"][0], "retry");
        assert_eq!(value["patch"], "a: 1\nb: 2");
        assert_eq!(value["failure_type"], "test_failure");
        assert!(json.contains("\n  \"summary\""));
    }

    #[test]
    fn test_render_text_sections() {
        let diagnosis = sample(
            "steps:\n  - run: pytest -x",
            vec!["pin pytest".to_string(), "rerun".to_string()],
        );
        let text = render_text(&diagnosis);
        assert!(text.starts_with("CI failure diagnosis (test_failure)"));
        assert!(text.contains("Top error:\n  RuntimeError: boom"));
        assert!(text.contains("Failing step:\n  Run pytest"));
        assert!(text.contains("  1. pin pytest\n  2. rerun"));
        assert!(text.contains("Suggested patch:\n    steps:\n      - run: pytest -x"));
    }

    #[test]
    fn test_render_text_empty_sections() {
        let mut diagnosis = sample("", Vec::new());
        diagnosis.parsed.failing_step = None;
        let text = render_text(&diagnosis);
        assert!(text.contains("Remediations:\n  (none)"));
        assert!(!text.contains("Suggested patch"));
        assert!(!text.contains("Failing step"));
    }
}
