//! # Agentlore
//!
//! Adaptive-learning engine for AI coding-agent orchestrators.
//!
//! Agentlore remembers every task execution, models relationships between
//! tasks, files, and agents as a knowledge graph, and uses that memory to
//! warm up new tasks, score partial progress, and pick a better agent when a
//! task keeps failing.
//!
//! ## Components
//!
//! - Knowledge graph with multi-hop expansion and shortest paths
//! - Progress scorer fusing test/build events with tool and file success rates
//! - Warm-up builder ranking past executions by file overlap and name distance
//! - Failure analyzer and agent selector for retries
//!
//! ## Example
//!
//! ```rust,ignore
//! use agentlore::{LearningConfig, WarmUpBuilder, TaskDescriptor};
//! use agentlore::storage::records::SqliteLearningStore;
//!
//! let store = SqliteLearningStore::new("learning.db")?;
//! let builder = WarmUpBuilder::new(store, LearningConfig::default());
//! let context = builder.build_context(
//!     &cancel,
//!     Some(&TaskDescriptor::new("plan.md", "3", "Add login handler")),
//! )?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::LearningConfig;
pub use models::{
    AgentSelection, Degradation, DegradationSource, EdgeType, FailureAnalysis, FailureCategory,
    KnowledgeEdge, KnowledgeNode, NodeId, NodeType, ProgressEvent, ProgressEventType, QcVerdict,
    SuccessfulPattern, TaskDescriptor, TaskExecution, WarmUpContext,
};
pub use services::{
    FailureAnalyzer, GraphService, PatternMetrics, ProgressScorer, WarmUpBuilder,
    select_better_agent,
};
pub use storage::{BehaviorStore, EventStore, ExecutionStore, GraphBackend, PatternStore};

/// Cancellation signal shared between the orchestrator and this engine.
pub use tokio_util::sync::CancellationToken;

/// Error type for agentlore operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty edge endpoints, out-of-range confidence, non-finite weights |
/// | `InvalidEventType` | A progress event type string outside the closed set |
/// | `InvalidExecutionId` | Progress requested for an execution id `<= 0` |
/// | `OperationFailed` | `SQLite` statements fail, config files cannot be read |
/// | `Cancelled` | The caller's cancellation token fired before a multi-step operation |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - An edge is missing its source or target id
    /// - An edge weight is NaN or infinite
    /// - A progress event confidence lies outside `[0, 1]`
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A progress event type outside the supported set.
    #[error("invalid event type: {0}")]
    InvalidEventType(String),

    /// A task execution id that cannot exist.
    #[error("invalid execution id: {0}")]
    InvalidExecutionId(i64),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` database operations fail
    /// - Configuration files cannot be read or parsed
    /// - Stored JSON blobs cannot be serialized
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The caller cancelled the operation before it started.
    #[error("operation '{operation}' cancelled")]
    Cancelled {
        /// The operation that was cancelled.
        operation: String,
    },
}

/// Result type alias for agentlore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use agentlore::current_timestamp;
///
/// assert!(current_timestamp() > 0);
/// ```
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn current_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Returns `Err(Error::Cancelled)` when `cancel` has already fired.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] naming `operation` if the token is cancelled.
pub fn ensure_not_cancelled(cancel: &CancellationToken, operation: &str) -> Result<()> {
    if cancel.is_cancelled() {
        metrics::counter!("operations_cancelled_total").increment(1);
        return Err(Error::Cancelled {
            operation: operation.to_string(),
        });
    }
    Ok(())
}
