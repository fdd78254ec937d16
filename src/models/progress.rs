//! Progress events ("LIP events") and their query filter.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete test or build outcome observed during an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventType {
    /// A test run passed.
    TestPass,
    /// A test run failed.
    TestFail,
    /// A build succeeded.
    BuildSuccess,
    /// A build failed.
    BuildFail,
}

impl ProgressEventType {
    /// Returns all event type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::TestPass,
            Self::TestFail,
            Self::BuildSuccess,
            Self::BuildFail,
        ]
    }

    /// Returns the event type as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TestPass => "test_pass",
            Self::TestFail => "test_fail",
            Self::BuildSuccess => "build_success",
            Self::BuildFail => "build_fail",
        }
    }

    /// Parses an event type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEventType`] for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "test_pass" => Ok(Self::TestPass),
            "test_fail" => Ok(Self::TestFail),
            "build_success" => Ok(Self::BuildSuccess),
            "build_fail" => Ok(Self::BuildFail),
            other => Err(Error::InvalidEventType(other.to_string())),
        }
    }
}

impl fmt::Display for ProgressEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProgressEventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A recorded progress event. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Store-assigned ID (0 until recorded).
    pub id: i64,
    /// Execution the event belongs to.
    pub task_execution_id: i64,
    /// Task number within the plan.
    pub task_number: String,
    /// Event type.
    pub event_type: ProgressEventType,
    /// When the event happened; `None` is stamped with the current time.
    pub timestamp: Option<DateTime<Utc>>,
    /// Free-text details.
    pub details: String,
    /// Confidence in `[0, 1]`; `None` defaults to 1.0.
    pub confidence: Option<f64>,
}

impl ProgressEvent {
    /// Creates an unrecorded event with default timestamp and confidence.
    #[must_use]
    pub fn new(
        task_execution_id: i64,
        task_number: impl Into<String>,
        event_type: ProgressEventType,
    ) -> Self {
        Self {
            id: 0,
            task_execution_id,
            task_number: task_number.into(),
            event_type,
            timestamp: None,
            details: String::new(),
            confidence: None,
        }
    }

    /// Sets the confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Confidence with the default applied.
    #[must_use]
    pub fn effective_confidence(&self) -> f64 {
        self.confidence.unwrap_or(1.0)
    }
}

/// Filter for progress event queries. Empty fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    /// Only events for this task number.
    pub task_number: Option<String>,
    /// Only events for this execution.
    pub task_execution_id: Option<i64>,
    /// Only events at or after this time.
    pub since: Option<DateTime<Utc>>,
    /// Only events at or before this time.
    pub until: Option<DateTime<Utc>>,
    /// Only these event types.
    pub event_types: Vec<ProgressEventType>,
    /// Only events with at least this confidence.
    pub min_confidence: Option<f64>,
    /// Maximum number of events returned.
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one execution.
    #[must_use]
    pub const fn for_execution(mut self, task_execution_id: i64) -> Self {
        self.task_execution_id = Some(task_execution_id);
        self
    }

    /// Restricts to one task number.
    #[must_use]
    pub fn for_task(mut self, task_number: impl Into<String>) -> Self {
        self.task_number = Some(task_number.into());
        self
    }

    /// Restricts to a time range (inclusive).
    #[must_use]
    pub const fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    /// Restricts to the given event types.
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = ProgressEventType>) -> Self {
        self.event_types = types.into_iter().collect();
        self
    }

    /// Restricts to events with at least this confidence.
    #[must_use]
    pub const fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    /// Caps the number of events returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parse() {
        for event_type in ProgressEventType::all() {
            assert_eq!(ProgressEventType::parse(event_type.as_str()).unwrap(), *event_type);
        }
    }

    #[test]
    fn test_event_type_parse_rejects_unknown() {
        let err = ProgressEventType::parse("lint_pass").unwrap_err();
        assert!(matches!(err, Error::InvalidEventType(ref s) if s == "lint_pass"));
        assert!("TEST_PASS".parse::<ProgressEventType>().is_err());
    }

    #[test]
    fn test_effective_confidence_default() {
        let event = ProgressEvent::new(1, "1", ProgressEventType::TestPass);
        assert!((event.effective_confidence() - 1.0).abs() < f64::EPSILON);
        let event = event.with_confidence(0.25);
        assert!((event.effective_confidence() - 0.25).abs() < f64::EPSILON);
    }
}
