//! Graph storage backends for knowledge graph operations.
//!
//! This module provides implementations of the [`GraphBackend`] trait for
//! storing typed nodes and directed edges.
//!
//! # Available Backends
//!
//! | Backend | Use Case | Features |
//! |---------|----------|----------|
//! | [`SqliteGraphBackend`] | Default; embedded | Indexed edge lookups, batched neighbor queries |
//! | [`InMemoryGraphBackend`] | Testing | Fast, no persistence |
//!
//! # Example
//!
//! ```rust,ignore
//! use agentlore::storage::graph::SqliteGraphBackend;
//! use agentlore::storage::GraphBackend;
//! use agentlore::models::graph::{KnowledgeNode, NodeId, NodeType};
//!
//! let backend = SqliteGraphBackend::new(".agentlore/graph.db")?;
//!
//! let node = KnowledgeNode::new(NodeType::Agent)
//!     .with_id(NodeId::for_agent("rust-pro"))
//!     .with_created_at(agentlore::current_timestamp());
//! backend.store_node(&node)?;
//! ```

mod memory;
mod sqlite;

pub use memory::InMemoryGraphBackend;
pub use sqlite::SqliteGraphBackend;

// Re-export trait for convenience
pub use crate::storage::traits::graph::{GraphBackend, GraphStats};
