//! Progress scoring for task executions.
//!
//! A failing attempt can still have made real progress: tests that now
//! pass, a build that succeeds, tools and file edits that worked. The
//! [`ProgressScorer`] fuses those signals into one score in `[0, 1]`.
//!
//! # Scoring Model
//!
//! | Term | Source | Weight |
//! |------|--------|--------|
//! | `test_pass` | avg confidence of events | 0.3 |
//! | `test_fail` | avg confidence of events | 0.1 |
//! | `build_success` | avg confidence of events | 0.3 |
//! | `build_fail` | avg confidence of events | 0.1 |
//! | tools | tool invocation success rate | 0.1 |
//! | files | file operation success rate | 0.2 |
//!
//! The weights sum to 1.1, so an execution with every signal at full
//! confidence hits the final `min(1.0, sum)` cap.

use crate::models::{EventFilter, ProgressEvent, ProgressEventType};
use crate::storage::traits::{BehaviorStore, EventStore};
use crate::{CancellationToken, Error, Result, ensure_not_cancelled};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Weight of the tool success rate.
pub const TOOL_WEIGHT: f64 = 0.1;

/// Weight of the file operation success rate.
pub const FILE_WEIGHT: f64 = 0.2;

/// Weight applied to the average confidence of one event type.
#[must_use]
pub const fn event_weight(event_type: ProgressEventType) -> f64 {
    match event_type {
        ProgressEventType::TestPass | ProgressEventType::BuildSuccess => 0.3,
        ProgressEventType::TestFail | ProgressEventType::BuildFail => 0.1,
    }
}

/// Records progress events and computes progress scores.
pub struct ProgressScorer<S: EventStore + BehaviorStore + ?Sized> {
    store: Arc<S>,
}

impl<S: EventStore + BehaviorStore> ProgressScorer<S> {
    /// Creates a scorer that owns its store.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

impl<S: EventStore + BehaviorStore + ?Sized> ProgressScorer<S> {
    /// Creates a scorer over a shared store.
    #[must_use]
    pub const fn with_shared_store(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Appends an event, defaulting its timestamp to now and its confidence to 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the confidence lies outside `[0, 1]`,
    /// or an error if the insert fails.
    #[instrument(skip(self, event), fields(execution_id = event.task_execution_id, event_type = %event.event_type))]
    pub fn record_event(&self, mut event: ProgressEvent) -> Result<ProgressEvent> {
        if let Some(confidence) = event.confidence
            && !(0.0..=1.0).contains(&confidence)
        {
            return Err(Error::InvalidInput(format!(
                "confidence must be within [0, 1], got {confidence}"
            )));
        }

        event.timestamp.get_or_insert_with(Utc::now);
        event.confidence.get_or_insert(1.0);
        event.id = self.store.insert_event(&event)?;

        metrics::counter!(
            "progress_events_recorded_total",
            "event_type" => event.event_type.as_str()
        )
        .increment(1);
        Ok(event)
    }

    /// Parses `event_type` and records the event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEventType`] for an unknown type string, or any
    /// error from [`Self::record_event`].
    pub fn record_named_event(
        &self,
        task_execution_id: i64,
        task_number: &str,
        event_type: &str,
        details: &str,
    ) -> Result<ProgressEvent> {
        let event_type = ProgressEventType::parse(event_type)?;
        self.record_event(
            ProgressEvent::new(task_execution_id, task_number, event_type).with_details(details),
        )
    }

    /// Queries events, newest first.
    ///
    /// Without an event-type subset the legacy behavioral source is probed
    /// as well; it currently contributes no events.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    #[instrument(skip(self, filter))]
    pub fn get_events(&self, filter: &EventFilter) -> Result<Vec<ProgressEvent>> {
        let mut events = self.store.query_events(filter)?;

        if filter.event_types.is_empty() {
            let legacy = Self::legacy_behavioral_events(filter);
            if !legacy.is_empty() {
                events.extend(legacy);
                events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
                if let Some(limit) = filter.limit {
                    events.truncate(limit);
                }
            }
        }

        Ok(events)
    }

    /// Derived events from behavioral sessions recorded before progress
    /// events existed. Nothing is derived yet.
    fn legacy_behavioral_events(filter: &EventFilter) -> Vec<ProgressEvent> {
        tracing::trace!(
            execution_id = filter.task_execution_id,
            "legacy behavioral probe returned no events"
        );
        Vec::new()
    }

    /// Computes the progress score of one execution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` already fired,
    /// [`Error::InvalidExecutionId`] for `execution_id <= 0`, or an error if
    /// a store query fails.
    #[instrument(skip(self, cancel))]
    pub fn calculate_progress(&self, cancel: &CancellationToken, execution_id: i64) -> Result<f64> {
        ensure_not_cancelled(cancel, "calculate_progress")?;
        if execution_id <= 0 {
            return Err(Error::InvalidExecutionId(execution_id));
        }

        let events = self
            .store
            .query_events(&EventFilter::new().for_execution(execution_id))?;
        let rates = self.store.operation_success_rates(execution_id)?;

        let event_term = event_term(&events);
        let tool_term = rates.tool_success_rate.unwrap_or(0.0) * TOOL_WEIGHT;
        let file_term = rates.file_success_rate.unwrap_or(0.0) * FILE_WEIGHT;
        let score = (event_term + tool_term + file_term).min(1.0);

        metrics::histogram!("progress_score").record(score);
        tracing::debug!(
            execution_id,
            event_term,
            tool_term,
            file_term,
            score,
            "calculated progress"
        );
        Ok(score)
    }
}

/// Σ over event types of `avg(confidence) × weight`.
#[allow(clippy::cast_precision_loss)]
fn event_term(events: &[ProgressEvent]) -> f64 {
    let mut by_type: BTreeMap<ProgressEventType, (f64, usize)> = BTreeMap::new();
    for event in events {
        let entry = by_type.entry(event.event_type).or_insert((0.0, 0));
        entry.0 += event.effective_confidence();
        entry.1 += 1;
    }

    by_type
        .into_iter()
        .map(|(event_type, (sum, count))| sum / count as f64 * event_weight(event_type))
        .sum()
}
