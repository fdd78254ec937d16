//! Record store traits: executions, behavioral data, progress events, patterns.
//!
//! These are the narrow interfaces the learning services need from the
//! orchestrator's persisted records. `SqliteLearningStore` implements all
//! four against one database.

use crate::Result;
use crate::models::{
    AgentSuccessCount, EventFilter, FileOperation, OperationRates, ProgressEvent,
    SuccessfulPattern, TaskExecution, ToolExecution,
};

/// Task execution records.
pub trait ExecutionStore: Send + Sync {
    /// Appends an execution and returns its generated ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn record_execution(&self, execution: &TaskExecution) -> Result<i64>;

    /// Retrieves one execution by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_execution(&self, id: i64) -> Result<Option<TaskExecution>>;

    /// All executions of one plan task, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn task_history(&self, plan_file: &str, task_number: &str) -> Result<Vec<TaskExecution>>;

    /// The `limit` most recent executions across all plans, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn recent_executions(&self, limit: usize) -> Result<Vec<TaskExecution>>;

    /// Agents with at least `min_successes` successful executions, excluding
    /// `exclude`, ordered by success count descending then name ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn agent_success_counts(
        &self,
        min_successes: u64,
        exclude: &[String],
    ) -> Result<Vec<AgentSuccessCount>>;
}

/// Behavioral sessions with their tool invocations and file operations.
pub trait BehaviorStore: Send + Sync {
    /// Opens a session for an execution and returns the session ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn record_session(&self, task_execution_id: i64, agent: &str) -> Result<i64>;

    /// Appends a tool invocation to a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn record_tool_execution(&self, session_id: i64, tool: &ToolExecution) -> Result<i64>;

    /// Appends a file operation to a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn record_file_operation(&self, session_id: i64, operation: &FileOperation) -> Result<i64>;

    /// Success ratios over every session linked to the execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn operation_success_rates(&self, task_execution_id: i64) -> Result<OperationRates>;
}

/// Append-only progress event log.
pub trait EventStore: Send + Sync {
    /// Inserts a fully-defaulted event and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert_event(&self, event: &ProgressEvent) -> Result<i64>;

    /// Events matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn query_events(&self, filter: &EventFilter) -> Result<Vec<ProgressEvent>>;
}

/// Patterns of task approaches that succeeded.
pub trait PatternStore: Send + Sync {
    /// Records a success for `task_hash`, creating the pattern or bumping its
    /// count and refreshing its description and agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    fn record_pattern_success(&self, task_hash: &str, description: &str, agent: &str)
    -> Result<()>;

    /// The `limit` patterns with the highest success count.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn top_patterns(&self, limit: usize) -> Result<Vec<SuccessfulPattern>>;

    /// Patterns whose hash starts with `prefix`, highest success count first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn patterns_by_hash_prefix(&self, prefix: &str, limit: usize)
    -> Result<Vec<SuccessfulPattern>>;
}
