//! Detection counters for failure patterns.
//!
//! A [`PatternMetrics`] instance is created by the caller and shared with
//! every [`FailureAnalyzer`](crate::services::FailureAnalyzer) through an
//! `Arc`, so separate analyzers (or tests) never share hidden global state.

use crate::models::FailureCategory;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Per-category detection statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryStats {
    /// How many outputs triggered the category.
    pub detections: u64,
    /// Distinct keywords that triggered it.
    pub keywords: BTreeSet<String>,
}

/// Thread-safe collector of failure pattern detections.
///
/// Also forwards every detection to the `metrics` facade as
/// `failure_patterns_detected_total{category}`.
#[derive(Debug, Default)]
pub struct PatternMetrics {
    categories: RwLock<BTreeMap<FailureCategory, CategoryStats>>,
}

impl PatternMetrics {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<FailureCategory, CategoryStats>> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<FailureCategory, CategoryStats>> {
        self.categories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records that `keyword` triggered `category`.
    pub fn record_detection(&self, category: FailureCategory, keyword: &str) {
        {
            let mut categories = self.write();
            let stats = categories.entry(category).or_default();
            stats.detections += 1;
            stats.keywords.insert(keyword.to_string());
        }

        metrics::counter!(
            "failure_patterns_detected_total",
            "category" => category.as_str()
        )
        .increment(1);
    }

    /// Number of detections for `category`.
    #[must_use]
    pub fn detection_count(&self, category: FailureCategory) -> u64 {
        self.read().get(&category).map_or(0, |s| s.detections)
    }

    /// Keywords that triggered `category`, sorted.
    #[must_use]
    pub fn keywords_for(&self, category: FailureCategory) -> Vec<String> {
        self.read()
            .get(&category)
            .map(|s| s.keywords.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Copy of all statistics.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<FailureCategory, CategoryStats> {
        self.read().clone()
    }

    /// Total detections across categories.
    #[must_use]
    pub fn total_detections(&self) -> u64 {
        self.read().values().map(|s| s.detections).sum()
    }

    /// Clears every counter.
    pub fn reset(&self) {
        self.write().clear();
    }
}
