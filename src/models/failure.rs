//! Failure categories, failure analysis, and agent selection results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorical failure signature found in execution output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Code did not compile.
    CompilationError,
    /// Tests ran and failed.
    TestFailure,
    /// A dependency or module could not be found.
    DependencyMissing,
    /// The agent lacked filesystem or process permissions.
    PermissionDenied,
    /// Something took too long.
    Timeout,
    /// The program crashed at runtime.
    RuntimeError,
    /// Source could not be parsed.
    SyntaxError,
    /// Types did not line up.
    TypeError,
}

impl FailureCategory {
    /// Returns all categories in scan order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::CompilationError,
            Self::TestFailure,
            Self::DependencyMissing,
            Self::PermissionDenied,
            Self::Timeout,
            Self::RuntimeError,
            Self::SyntaxError,
            Self::TypeError,
        ]
    }

    /// Returns the category name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CompilationError => "compilation_error",
            Self::TestFailure => "test_failure",
            Self::DependencyMissing => "dependency_missing",
            Self::PermissionDenied => "permission_denied",
            Self::Timeout => "timeout",
            Self::RuntimeError => "runtime_error",
            Self::SyntaxError => "syntax_error",
            Self::TypeError => "type_error",
        }
    }

    /// Lower-case keywords whose presence signals this category.
    #[must_use]
    pub const fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::CompilationError => &[
                "compilation",
                "compile error",
                "build failed",
                "parse error",
                "could not compile",
            ],
            Self::TestFailure => &[
                "test failed",
                "tests failed",
                "assertion failed",
                "--- fail",
                "test failure",
            ],
            Self::DependencyMissing => &[
                "cannot find package",
                "module not found",
                "no such module",
                "unresolved import",
                "missing dependency",
                "package not found",
            ],
            Self::PermissionDenied => &[
                "permission denied",
                "access denied",
                "operation not permitted",
            ],
            Self::Timeout => &["timed out", "timeout", "deadline exceeded"],
            Self::RuntimeError => &[
                "panic",
                "runtime error",
                "segmentation fault",
                "nil pointer",
                "null pointer",
            ],
            Self::SyntaxError => &["syntax error", "unexpected token", "unexpected eof"],
            Self::TypeError => &[
                "type error",
                "type mismatch",
                "mismatched types",
                "incompatible types",
            ],
        }
    }

    /// Canned remediation advice.
    #[must_use]
    pub const fn remediation(&self) -> &'static str {
        match self {
            Self::CompilationError => {
                "Fix compilation errors first: re-read the compiler output and build after every change."
            },
            Self::TestFailure => {
                "Run the failing tests in isolation and fix the assertions they report before adding new code."
            },
            Self::DependencyMissing => {
                "Check imports and the dependency manifest; add or install missing packages before building."
            },
            Self::PermissionDenied => {
                "Verify file and directory permissions and avoid writing outside the workspace."
            },
            Self::Timeout => {
                "Break the work into smaller steps and avoid long-running or blocking commands."
            },
            Self::RuntimeError => {
                "Guard against nil/null values and panics; add checks around the crashing code path."
            },
            Self::SyntaxError => {
                "Fix syntax errors: check brackets, quotes, and statement terminators near the reported line."
            },
            Self::TypeError => {
                "Resolve type mismatches: align function signatures and conversions with the declared types."
            },
        }
    }

    /// Parses a category name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of a task's failed attempts and what to try next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    /// Attempts recorded for the task.
    pub total_attempts: usize,
    /// Attempts that failed.
    pub failed_attempts: usize,
    /// Distinct agents already tried, in first-seen order.
    pub tried_agents: Vec<String>,
    /// Distinct failure categories detected in failed outputs.
    pub common_patterns: Vec<FailureCategory>,
    /// Agent to try next; empty when no swap is advised.
    pub suggested_agent: String,
    /// Why `suggested_agent` was chosen.
    pub suggestion_reason: String,
    /// Human-readable remediation advice.
    pub suggested_approach: String,
    /// Whether the orchestrator should switch agents.
    pub should_try_different_agent: bool,
}

/// Agent chosen for the next retry and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSelection {
    /// Agent name.
    pub agent: String,
    /// Selection reason.
    pub reason: String,
}

impl AgentSelection {
    /// Creates a selection.
    #[must_use]
    pub fn new(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for category in FailureCategory::all() {
            assert_eq!(FailureCategory::parse(category.as_str()), Some(*category));
            assert!(!category.keywords().is_empty());
            assert!(!category.remediation().is_empty());
        }
        assert_eq!(FailureCategory::parse("disk_full"), None);
    }

    #[test]
    fn test_keywords_are_lowercase() {
        for category in FailureCategory::all() {
            for keyword in category.keywords() {
                assert_eq!(*keyword, keyword.to_lowercase());
            }
        }
    }
}
