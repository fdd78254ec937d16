//! Storage layer abstraction.
//!
//! This module provides two storage areas:
//! - **Graph**: typed nodes and edges of the knowledge graph (`SQLite`, in-memory)
//! - **Records**: task executions, behavioral sessions, progress events, and
//!   successful patterns (`SQLite`)
//!
//! Services depend only on the traits in [`traits`], so tests can swap in
//! in-memory backends.

// Allow cast precision loss for score calculations where exact precision is not critical.
#![allow(clippy::cast_precision_loss)]
// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod graph;
pub mod records;
pub mod sqlite;
pub mod traits;

pub use graph::{InMemoryGraphBackend, SqliteGraphBackend};
pub use records::SqliteLearningStore;
pub use traits::{
    BehaviorStore, EventStore, ExecutionStore, GraphBackend, GraphStats, PatternStore,
};
