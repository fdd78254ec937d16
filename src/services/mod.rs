//! Business logic services.
//!
//! Services orchestrate storage backends and provide the learning
//! operations: graph traversal, progress scoring, warm-up, and failure
//! analysis.

mod failure;
mod graph;
pub mod pattern_metrics;
mod progress;
pub mod similarity;
mod warmup;

pub use failure::{
    FailureAnalyzer, REASON_FALLBACK, REASON_HISTORICAL_BEST, REASON_QC_SUGGESTED,
    select_better_agent,
};
pub use graph::{GraphService, MAX_HOPS};
pub use pattern_metrics::{CategoryStats, PatternMetrics};
pub use progress::{FILE_WEIGHT, ProgressScorer, TOOL_WEIGHT, event_weight};
pub use warmup::{WarmUpBuilder, WarmUpStore};
