//! Warm-up context handed to an agent before it starts a task.

use super::{SuccessfulPattern, TaskExecution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which best-effort step of a warm-up build fell back to partial data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradationSource {
    /// Successful-pattern lookup failed; pattern list is empty.
    PatternMatch,
    /// Progress scoring failed for one execution; its score is missing.
    ProgressScore {
        /// Execution whose score is missing.
        execution_id: i64,
    },
    /// Graph lookup failed; related agents may be incomplete.
    GraphLookup,
}

/// Marker recording that a warm-up context is missing some data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    /// Step that degraded.
    pub source: DegradationSource,
    /// Underlying error text.
    pub reason: String,
}

impl Degradation {
    /// Creates a degradation marker.
    #[must_use]
    pub fn new(source: DegradationSource, reason: impl Into<String>) -> Self {
        Self {
            source,
            reason: reason.into(),
        }
    }
}

/// Similar past executions plus what can be learned from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarmUpContext {
    /// Similar executions, most similar first.
    pub relevant_history: Vec<TaskExecution>,
    /// Successful patterns matching the similar executions.
    pub similar_patterns: Vec<SuccessfulPattern>,
    /// Suggested approach derived from the best similar execution.
    pub recommended_approach: String,
    /// Confidence in the recommendation, in `[0, 1]`.
    pub confidence: f64,
    /// Progress score per similar execution id.
    pub progress_scores: BTreeMap<i64, f64>,
    /// IDs of the similar executions, in history order.
    pub similar_task_ids: Vec<i64>,
    /// Combined similarity per similar execution id.
    pub similarity_scores: BTreeMap<i64, f64>,
    /// Agents linked to similar tasks in the knowledge graph.
    pub related_agents: Vec<String>,
    /// Best-effort steps that fell back to partial data.
    pub degradations: Vec<Degradation>,
}

impl WarmUpContext {
    /// Creates an empty, zero-confidence context.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if any best-effort step degraded.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Returns true if no similar executions were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relevant_history.is_empty()
    }
}
