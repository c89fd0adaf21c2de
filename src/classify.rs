//! Coarse failure categories used to steer the prompt and tag the report.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    TestFailure,
    NpmFailure,
    DockerFailure,
    PythonFailure,
    GeneralFailure,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::TestFailure => "test_failure",
            FailureType::NpmFailure => "npm_failure",
            FailureType::DockerFailure => "docker_failure",
            FailureType::PythonFailure => "python_failure",
            FailureType::GeneralFailure => "general_failure",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a failure from its top error line. First keyword group that hits wins.
pub fn classify(top_error: &str) -> FailureType {
    let lower = top_error.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has_any(&["test", "jest"]) {
        FailureType::TestFailure
    } else if has_any(&["npm", "package"]) {
        FailureType::NpmFailure
    } else if has_any(&["docker"]) {
        FailureType::DockerFailure
    } else if has_any(&["python", "import"]) {
        FailureType::PythonFailure
    } else {
        FailureType::GeneralFailure
    }
}
