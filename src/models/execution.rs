//! Task execution records and the behavioral data linked to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality-control verdict attached to an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QcVerdict {
    /// Passed review.
    Green,
    /// Passed with concerns.
    Yellow,
    /// Failed review.
    Red,
}

impl QcVerdict {
    /// Returns the verdict as stored (`GREEN`, `YELLOW`, `RED`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Red => "RED",
        }
    }

    /// Parses a verdict, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GREEN" => Some(Self::Green),
            "YELLOW" => Some(Self::Yellow),
            "RED" => Some(Self::Red),
            _ => None,
        }
    }
}

impl fmt::Display for QcVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded attempt at running a plan task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    /// Store-assigned ID (0 until recorded).
    pub id: i64,
    /// Plan file the task belongs to.
    pub plan_file: String,
    /// Orchestrator run number.
    pub run_number: u32,
    /// Task number within the plan (e.g. `"3"` or `"2.1"`).
    pub task_number: String,
    /// Human-readable task name.
    pub task_name: String,
    /// Agent that ran the task.
    pub agent: String,
    /// Prompt handed to the agent.
    pub prompt: String,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Captured agent output.
    pub output: String,
    /// Error text, if any.
    pub error_message: Option<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// QC verdict, if the execution was reviewed.
    pub qc_verdict: Option<QcVerdict>,
    /// QC reviewer feedback.
    pub qc_feedback: String,
    /// Failure pattern categories recorded by the orchestrator.
    pub failure_patterns: Vec<String>,
    /// Files the execution touched.
    pub files: Vec<String>,
    /// When the execution finished.
    pub timestamp: DateTime<Utc>,
}

impl TaskExecution {
    /// Creates an unsuccessful, unrecorded execution stamped with the current time.
    #[must_use]
    pub fn new(
        plan_file: impl Into<String>,
        task_number: impl Into<String>,
        task_name: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            plan_file: plan_file.into(),
            run_number: 1,
            task_number: task_number.into(),
            task_name: task_name.into(),
            agent: agent.into(),
            prompt: String::new(),
            success: false,
            output: String::new(),
            error_message: None,
            duration_ms: 0,
            qc_verdict: None,
            qc_feedback: String::new(),
            failure_patterns: Vec::new(),
            files: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Sets the success flag.
    #[must_use]
    pub const fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Sets the output text.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Sets the error text.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error_message = Some(error.into());
        self
    }

    /// Sets the QC verdict.
    #[must_use]
    pub const fn with_qc_verdict(mut self, verdict: QcVerdict) -> Self {
        self.qc_verdict = Some(verdict);
        self
    }

    /// Sets the touched files.
    #[must_use]
    pub fn with_files(mut self, files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the run number.
    #[must_use]
    pub const fn with_run_number(mut self, run_number: u32) -> Self {
        self.run_number = run_number;
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns true if the execution succeeded with a GREEN verdict.
    #[must_use]
    pub fn is_green_success(&self) -> bool {
        self.success && self.qc_verdict == Some(QcVerdict::Green)
    }

    /// Returns true if this execution is for the given plan task.
    #[must_use]
    pub fn is_same_task(&self, plan_file: &str, task_number: &str) -> bool {
        self.plan_file == plan_file && self.task_number == task_number
    }
}

/// Description of a task about to run, used to look up similar history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Plan file the task belongs to.
    pub plan_file: String,
    /// Task number within the plan.
    pub task_number: String,
    /// Task name.
    pub name: String,
    /// Files the task is expected to touch.
    pub files: Vec<String>,
}

impl TaskDescriptor {
    /// Creates a descriptor with no target files.
    #[must_use]
    pub fn new(
        plan_file: impl Into<String>,
        task_number: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            plan_file: plan_file.into(),
            task_number: task_number.into(),
            name: name.into(),
            files: Vec::new(),
        }
    }

    /// Sets the target files.
    #[must_use]
    pub fn with_files(mut self, files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }
}

/// A task approach that has worked before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessfulPattern {
    /// Store-assigned ID.
    pub id: i64,
    /// Normalized task-name hash (lower-case letters and digits only).
    pub task_hash: String,
    /// Description of what worked.
    pub description: String,
    /// Agent that most recently succeeded with it.
    pub last_agent: String,
    /// Number of successes recorded.
    pub success_count: u64,
    /// Last time the pattern was seen (Unix seconds).
    pub last_seen: i64,
}

/// Count of successful executions for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSuccessCount {
    /// Agent name.
    pub agent: String,
    /// Successful executions across all tasks.
    pub successes: u64,
}

/// One tool invocation inside a behavioral session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecution {
    /// Tool name (e.g. `Edit`, `Bash`).
    pub tool_name: String,
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl ToolExecution {
    /// Creates a tool execution record.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, success: bool) -> Self {
        Self {
            tool_name: tool_name.into(),
            success,
            duration_ms: 0,
        }
    }
}

/// One file operation inside a behavioral session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOperation {
    /// Operation kind (`read`, `write`, `edit`, `delete`).
    pub operation: String,
    /// File path.
    pub path: String,
    /// Whether the operation succeeded.
    pub success: bool,
}

impl FileOperation {
    /// Creates a file operation record.
    #[must_use]
    pub fn new(operation: impl Into<String>, path: impl Into<String>, success: bool) -> Self {
        Self {
            operation: operation.into(),
            path: path.into(),
            success,
        }
    }
}

/// Success ratios of the tool invocations and file operations linked to an execution.
///
/// `None` means no records exist for that source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OperationRates {
    /// Successful tool invocations / all tool invocations.
    pub tool_success_rate: Option<f64>,
    /// Successful file operations / all file operations.
    pub file_success_rate: Option<f64>,
}
