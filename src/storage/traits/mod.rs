//! Storage backend traits.

pub mod graph;
mod records;

pub use graph::{GraphBackend, GraphStats};
pub use records::{BehaviorStore, EventStore, ExecutionStore, PatternStore};
