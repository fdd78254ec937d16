//! Similarity-based warm-up context builder.
//!
//! Before a task starts, [`WarmUpBuilder::build_context`] looks for similar
//! past executions and condenses what they teach into a [`WarmUpContext`].
//!
//! # Pipeline
//!
//! ```text
//! recent executions (window)
//!   -> drop the task's own runs
//!   -> 0.6 * file Jaccard + 0.4 * name similarity >= threshold
//!   -> top N by similarity
//!   -> progress scores, patterns, approach, graph agents
//!   -> confidence
//! ```
//!
//! Progress scores, pattern matching, and graph enrichment are best-effort:
//! a failure there is recorded as a [`Degradation`] on the context.

use crate::config::LearningConfig;
use crate::models::graph::{EdgeType, NodeId, NodeType};
use crate::models::{
    Degradation, DegradationSource, SuccessfulPattern, TaskDescriptor, TaskExecution,
    WarmUpContext,
};
use crate::services::progress::ProgressScorer;
use crate::services::similarity::{file_similarity, name_similarity, task_hash};
use crate::storage::traits::{
    BehaviorStore, EventStore, ExecutionStore, GraphBackend, PatternStore,
};
use crate::{CancellationToken, Result, ensure_not_cancelled};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Characters of a task hash compared when matching patterns.
const HASH_PREFIX_LEN: usize = 8;

/// Output excerpt length for a GREEN success.
const GREEN_EXCERPT_CHARS: usize = 500;

/// Output excerpt length for any other success.
const SUCCESS_EXCERPT_CHARS: usize = 300;

/// Weight of the average progress score in the confidence.
const PROGRESS_CONFIDENCE_WEIGHT: f64 = 0.2;

/// Upper bound of the history-size boost in the confidence.
const MAX_COUNT_BOOST: f64 = 0.1;

/// Everything the warm-up builder reads.
pub trait WarmUpStore: ExecutionStore + PatternStore + EventStore + BehaviorStore {}

impl<T: ExecutionStore + PatternStore + EventStore + BehaviorStore + ?Sized> WarmUpStore for T {}

/// Builds warm-up contexts from execution history.
pub struct WarmUpBuilder<S: WarmUpStore + ?Sized> {
    store: Arc<S>,
    scorer: ProgressScorer<S>,
    graph: Option<Arc<dyn GraphBackend>>,
    config: LearningConfig,
}

impl<S: WarmUpStore> WarmUpBuilder<S> {
    /// Creates a builder that owns its store.
    pub fn new(store: S, config: LearningConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }
}

impl<S: WarmUpStore + ?Sized> WarmUpBuilder<S> {
    /// Creates a builder over a shared store.
    #[must_use]
    pub fn with_shared_store(store: Arc<S>, config: LearningConfig) -> Self {
        Self {
            scorer: ProgressScorer::with_shared_store(Arc::clone(&store)),
            store,
            graph: None,
            config,
        }
    }

    /// Attaches a knowledge graph used to find agents related to similar tasks.
    #[must_use]
    pub fn with_graph(mut self, graph: Arc<dyn GraphBackend>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Builds the warm-up context for `task`.
    ///
    /// `None` yields an empty, zero-confidence context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`](crate::Error::Cancelled) if `cancel`
    /// already fired, or an error if recent executions cannot be read.
    /// Later steps degrade instead of failing.
    #[instrument(
        skip(self, cancel, task),
        fields(
            plan_file = task.map(|t| t.plan_file.as_str()),
            task_number = task.map(|t| t.task_number.as_str()),
        )
    )]
    pub fn build_context(
        &self,
        cancel: &CancellationToken,
        task: Option<&TaskDescriptor>,
    ) -> Result<WarmUpContext> {
        ensure_not_cancelled(cancel, "build_context")?;
        let Some(task) = task else {
            return Ok(WarmUpContext::empty());
        };

        let start = Instant::now();
        let recent = self.store.recent_executions(self.config.history_window)?;
        let similar = self.rank_similar(task, recent);

        let mut context = WarmUpContext::empty();
        if similar.is_empty() {
            tracing::debug!(task = %task.name, "no similar executions");
            record_build_metrics(&context, start);
            return Ok(context);
        }

        for (execution, similarity) in &similar {
            context.similar_task_ids.push(execution.id);
            context.similarity_scores.insert(execution.id, *similarity);
        }
        let history: Vec<TaskExecution> = similar.into_iter().map(|(e, _)| e).collect();

        for execution in &history {
            match self.scorer.calculate_progress(cancel, execution.id) {
                Ok(score) => {
                    context.progress_scores.insert(execution.id, score);
                },
                Err(e) => {
                    tracing::warn!(execution_id = execution.id, error = %e, "progress score unavailable");
                    context.degradations.push(Degradation::new(
                        DegradationSource::ProgressScore {
                            execution_id: execution.id,
                        },
                        e.to_string(),
                    ));
                },
            }
        }

        match self.match_patterns(&history) {
            Ok(patterns) => context.similar_patterns = patterns,
            Err(e) => {
                tracing::warn!(error = %e, "pattern matching unavailable");
                context
                    .degradations
                    .push(Degradation::new(DegradationSource::PatternMatch, e.to_string()));
            },
        }

        if let Some(graph) = &self.graph {
            match related_agents(graph.as_ref(), &history) {
                Ok(agents) => context.related_agents = agents,
                Err(e) => {
                    tracing::warn!(error = %e, "graph lookup unavailable");
                    context
                        .degradations
                        .push(Degradation::new(DegradationSource::GraphLookup, e.to_string()));
                },
            }
        }

        context.recommended_approach = recommended_approach(&history);
        context.relevant_history = history;
        context.confidence = confidence(&context);

        tracing::debug!(
            similar = context.relevant_history.len(),
            patterns = context.similar_patterns.len(),
            confidence = context.confidence,
            degraded = context.is_degraded(),
            "built warm-up context"
        );
        record_build_metrics(&context, start);
        Ok(context)
    }

    /// Scores candidates, keeps those above the threshold, most similar first.
    fn rank_similar(
        &self,
        task: &TaskDescriptor,
        recent: Vec<TaskExecution>,
    ) -> Vec<(TaskExecution, f64)> {
        let mut scored: Vec<(TaskExecution, f64)> = recent
            .into_iter()
            .filter(|e| !e.is_same_task(&task.plan_file, &task.task_number))
            .filter_map(|e| {
                let similarity = self.config.file_weight * file_similarity(&task.files, &e.files)
                    + self.config.name_weight * name_similarity(&task.name, &e.task_name);
                (similarity >= self.config.similarity_threshold).then_some((e, similarity))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.config.max_similar);
        scored
    }

    fn match_patterns(&self, history: &[TaskExecution]) -> Result<Vec<SuccessfulPattern>> {
        let pool = self.store.top_patterns(self.config.pattern_pool)?;
        let mut seen = HashSet::new();
        let mut matched = Vec::new();

        for execution in history {
            let candidate = task_hash(&execution.task_name);
            for pattern in &pool {
                if matched.len() >= self.config.max_patterns {
                    return Ok(matched);
                }
                if hashes_match(&pattern.task_hash, &candidate) && seen.insert(pattern.id) {
                    matched.push(pattern.clone());
                }
            }
        }

        Ok(matched)
    }
}

/// Either hash starts with the other's first eight characters. Empty hashes
/// never match.
fn hashes_match(pattern_hash: &str, candidate_hash: &str) -> bool {
    if pattern_hash.is_empty() || candidate_hash.is_empty() {
        return false;
    }
    pattern_hash.starts_with(hash_prefix(candidate_hash))
        || candidate_hash.starts_with(hash_prefix(pattern_hash))
}

fn hash_prefix(hash: &str) -> &str {
    hash.char_indices()
        .nth(HASH_PREFIX_LEN)
        .map_or(hash, |(idx, _)| &hash[..idx])
}

/// Agents joined by a `succeeded_with` edge to any of the executions' task
/// nodes, in first-seen order.
fn related_agents(graph: &dyn GraphBackend, history: &[TaskExecution]) -> Result<Vec<String>> {
    let mut task_ids: Vec<NodeId> = Vec::new();
    for execution in history {
        let id = NodeId::for_task(&execution.plan_file, &execution.task_number);
        if !task_ids.contains(&id) {
            task_ids.push(id);
        }
    }

    let neighbors = graph.neighbors(&task_ids, Some(&[EdgeType::SucceededWith]))?;
    let mut seen = HashSet::new();
    let candidates: Vec<NodeId> = task_ids
        .iter()
        .filter_map(|id| neighbors.get(id))
        .flatten()
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect();

    Ok(graph
        .get_nodes(&candidates)?
        .into_iter()
        .filter(|node| node.node_type == NodeType::Agent)
        .map(|node| {
            node.text_property("name")
                .map_or_else(|| node.id.as_str().to_string(), ToString::to_string)
        })
        .collect())
}

fn recommended_approach(history: &[TaskExecution]) -> String {
    if let Some(green) = history.iter().find(|e| e.is_green_success()) {
        return format!(
            "Similar task \"{}\" passed QC with agent {}: {}",
            green.task_name,
            green.agent,
            excerpt(&green.output, GREEN_EXCERPT_CHARS)
        );
    }
    history
        .iter()
        .find(|e| e.success)
        .map(|success| {
            format!(
                "Similar task \"{}\" succeeded with agent {}: {}",
                success.task_name,
                success.agent,
                excerpt(&success.output, SUCCESS_EXCERPT_CHARS)
            )
        })
        .unwrap_or_default()
}

/// First `max_chars` characters, with `...` appended when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// `avg similarity + avg progress * 0.2 + min(n / 10, 0.1)`, clamped to `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
fn confidence(context: &WarmUpContext) -> f64 {
    let n = context.relevant_history.len();
    if n == 0 {
        return 0.0;
    }

    let avg_similarity =
        context.similarity_scores.values().sum::<f64>() / context.similarity_scores.len().max(1) as f64;
    let avg_progress = if context.progress_scores.is_empty() {
        0.0
    } else {
        context.progress_scores.values().sum::<f64>() / context.progress_scores.len() as f64
    };
    let count_boost = (n as f64 / 10.0).min(MAX_COUNT_BOOST);

    (avg_similarity + avg_progress * PROGRESS_CONFIDENCE_WEIGHT + count_boost).clamp(0.0, 1.0)
}

fn record_build_metrics(context: &WarmUpContext, start: Instant) {
    let outcome = if context.is_empty() {
        "empty"
    } else if context.is_degraded() {
        "degraded"
    } else {
        "complete"
    };
    metrics::counter!("warmup_contexts_built_total", "outcome" => outcome).increment(1);
    metrics::histogram!("warmup_build_duration_ms").record(start.elapsed().as_secs_f64() * 1000.0);
}
