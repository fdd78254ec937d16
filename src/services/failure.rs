//! Failure analysis and agent selection for retries.
//!
//! [`FailureAnalyzer::analyze_failures`] looks at every recorded attempt of
//! one plan task, detects failure categories in the failed outputs, and
//! decides whether the orchestrator should switch agents. The decision is
//! gated: a single failure is treated as noise, and only agents with a
//! proven success record are suggested.

use crate::config::{DEFAULT_FALLBACK_AGENT, LearningConfig};
use crate::models::{AgentSelection, FailureAnalysis, FailureCategory, TaskExecution};
use crate::services::pattern_metrics::PatternMetrics;
use crate::storage::traits::ExecutionStore;
use crate::{CancellationToken, Result, ensure_not_cancelled};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Reason attached to a QC-suggested agent.
pub const REASON_QC_SUGGESTED: &str = "QC suggested agent";

/// Reason attached to the agent with the best success rate.
pub const REASON_HISTORICAL_BEST: &str = "historical best performer";

/// Reason attached to the fallback agent.
pub const REASON_FALLBACK: &str = "fallback agent";

/// Analyzes failed attempts and suggests the next agent.
pub struct FailureAnalyzer<S: ExecutionStore + ?Sized> {
    store: Arc<S>,
    metrics: Arc<PatternMetrics>,
    config: LearningConfig,
}

impl<S: ExecutionStore> FailureAnalyzer<S> {
    /// Creates an analyzer that owns its store.
    pub fn new(store: S, metrics: Arc<PatternMetrics>, config: LearningConfig) -> Self {
        Self::with_shared_store(Arc::new(store), metrics, config)
    }
}

impl<S: ExecutionStore + ?Sized> FailureAnalyzer<S> {
    /// Creates an analyzer over a shared store.
    #[must_use]
    pub const fn with_shared_store(
        store: Arc<S>,
        metrics: Arc<PatternMetrics>,
        config: LearningConfig,
    ) -> Self {
        Self {
            store,
            metrics,
            config,
        }
    }

    /// Returns the detection collector.
    #[must_use]
    pub fn metrics(&self) -> &PatternMetrics {
        &self.metrics
    }

    /// Summarizes the attempts at one plan task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`](crate::Error::Cancelled) if `cancel`
    /// already fired, or an error if a store query fails.
    #[instrument(skip(self, cancel))]
    pub fn analyze_failures(
        &self,
        cancel: &CancellationToken,
        plan_file: &str,
        task_number: &str,
    ) -> Result<FailureAnalysis> {
        ensure_not_cancelled(cancel, "analyze_failures")?;

        let history = self.store.task_history(plan_file, task_number)?;
        if history.is_empty() {
            return Ok(FailureAnalysis::default());
        }

        let failed: Vec<&TaskExecution> = history.iter().filter(|e| !e.success).collect();
        let mut analysis = FailureAnalysis {
            total_attempts: history.len(),
            failed_attempts: failed.len(),
            tried_agents: tried_agents(&history),
            ..FailureAnalysis::default()
        };

        let texts: Vec<String> = failed.iter().map(|e| failure_text(e)).collect();
        analysis.common_patterns = self.extract_failure_patterns(&texts);

        if analysis.failed_attempts >= self.config.failure_threshold {
            analysis.should_try_different_agent = true;
            let proven = self
                .store
                .agent_success_counts(self.config.min_agent_successes, &analysis.tried_agents)?;
            if let Some(best) = proven.into_iter().next() {
                analysis.suggestion_reason = format!(
                    "{} has {} successful executions and has not been tried on this task",
                    best.agent, best.successes
                );
                analysis.suggested_agent = best.agent;
            } else {
                analysis.suggested_agent = self.config.fallback_agent.clone();
                analysis.suggestion_reason = format!(
                    "no untried agent has at least {} successful executions",
                    self.config.min_agent_successes
                );
            }
        }

        analysis.suggested_approach =
            suggested_approach(&analysis.common_patterns, &analysis.suggested_agent);

        metrics::counter!(
            "failure_analyses_total",
            "swap" => if analysis.should_try_different_agent { "true" } else { "false" }
        )
        .increment(1);
        tracing::debug!(
            total = analysis.total_attempts,
            failed = analysis.failed_attempts,
            patterns = analysis.common_patterns.len(),
            suggested_agent = %analysis.suggested_agent,
            "analyzed failures"
        );
        Ok(analysis)
    }

    /// Distinct failure categories found in `outputs`, in first-detected order.
    ///
    /// Matching is case-insensitive. For each output, a category stops at its
    /// first matching keyword, and every hit is recorded in the collector.
    pub fn extract_failure_patterns<T: AsRef<str>>(&self, outputs: &[T]) -> Vec<FailureCategory> {
        let mut detected = Vec::new();
        for output in outputs {
            let lowered = output.as_ref().to_lowercase();
            for category in FailureCategory::all() {
                if let Some(keyword) = category.keywords().iter().find(|k| lowered.contains(*k)) {
                    self.metrics.record_detection(*category, keyword);
                    if !detected.contains(category) {
                        detected.push(*category);
                    }
                }
            }
        }
        detected
    }
}

/// Output plus error text of a failed execution.
fn failure_text(execution: &TaskExecution) -> String {
    match &execution.error_message {
        Some(error) if !error.is_empty() => format!("{}\n{error}", execution.output),
        _ => execution.output.clone(),
    }
}

/// Non-empty agent names, deduplicated, in first-seen order.
fn tried_agents(history: &[TaskExecution]) -> Vec<String> {
    let mut agents: Vec<String> = Vec::new();
    for execution in history {
        if !execution.agent.is_empty() && !agents.contains(&execution.agent) {
            agents.push(execution.agent.clone());
        }
    }
    agents
}

fn suggested_approach(categories: &[FailureCategory], suggested_agent: &str) -> String {
    if categories.is_empty() {
        return "No known failure pattern was detected; try a different agent or break the task into smaller steps.".to_string();
    }

    let mut approach = categories
        .iter()
        .map(FailureCategory::remediation)
        .collect::<Vec<_>>()
        .join(" ");
    if !suggested_agent.is_empty() {
        approach.push_str(&format!(" Retry with the {suggested_agent} agent."));
    }
    approach
}

#[derive(Debug, Default, Clone, Copy)]
struct AgentRecord {
    runs: u64,
    successes: u64,
}

impl AgentRecord {
    /// Orders by success rate without floating point, then by run count.
    fn cmp_performance(&self, other: &Self) -> Ordering {
        (u128::from(self.successes) * u128::from(other.runs))
            .cmp(&(u128::from(other.successes) * u128::from(self.runs)))
            .then(self.runs.cmp(&other.runs))
    }
}

/// Picks the agent for the next retry of a task.
///
/// 1. A non-empty QC suggestion that differs from `current`.
/// 2. The agent in `history` with the best success rate, other than
///    `current`; ties go to more runs, then the smaller name. Only agents
///    with no recorded run are left out.
/// 3. The fallback agent.
///
/// # Examples
///
/// ```
/// use agentlore::{TaskExecution, select_better_agent};
///
/// let history = vec![
///     TaskExecution::new("plan.md", "1", "Task", "alpha").with_success(true),
///     TaskExecution::new("plan.md", "2", "Task", "beta").with_success(false),
/// ];
/// let selection = select_better_agent("beta", &history, "");
/// assert_eq!(selection.agent, "alpha");
/// assert_eq!(selection.reason, "historical best performer");
/// ```
#[must_use]
pub fn select_better_agent(
    current: &str,
    history: &[TaskExecution],
    qc_suggestion: &str,
) -> AgentSelection {
    let suggestion = qc_suggestion.trim();
    if !suggestion.is_empty() && suggestion != current {
        return AgentSelection::new(suggestion, REASON_QC_SUGGESTED);
    }

    let mut records: BTreeMap<&str, AgentRecord> = BTreeMap::new();
    for execution in history {
        if execution.agent.is_empty() || execution.agent == current {
            continue;
        }
        let record = records.entry(execution.agent.as_str()).or_default();
        record.runs += 1;
        record.successes += u64::from(execution.success);
    }

    // BTreeMap iterates by name, so keeping the first maximum breaks full ties
    // toward the smaller name.
    let best = records
        .into_iter()
        .fold(None::<(&str, AgentRecord)>, |best, (agent, record)| match best {
            Some((_, current_best)) if record.cmp_performance(&current_best) != Ordering::Greater => best,
            _ => Some((agent, record)),
        });

    match best {
        Some((agent, _)) => AgentSelection::new(agent, REASON_HISTORICAL_BEST),
        None => AgentSelection::new(DEFAULT_FALLBACK_AGENT, REASON_FALLBACK),
    }
}
