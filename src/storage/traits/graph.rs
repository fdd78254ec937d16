//! Graph backend trait for knowledge graph storage.
//!
//! The graph layer stores typed nodes and directed, weighted edges between
//! tasks, files, agents, and patterns.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Notes |
//! |---------|----------|-------|
//! | `SqliteGraphBackend` | Default; embedded | Nodes and edges tables |
//! | `InMemoryGraphBackend` | Testing | Fast, no persistence |
//!
//! # Error Modes and Guarantees
//!
//! All backends return `Result<T>` with errors propagated via [`crate::Error`].
//! Missing nodes are `None`/skipped, never errors. Referential integrity is
//! not enforced: edges may name nodes that do not exist.
//!
//! | Operation | Complexity | Notes |
//! |-----------|------------|-------|
//! | `store_node` | O(1) | Insert or update |
//! | `store_edge` | O(1) | Always inserts; parallel edges allowed |
//! | `get_edges` | O(log n + k) | k = incident edges |
//! | `neighbors` | O(log n + k) | One query for a whole BFS frontier |
//! | `delete_node` | O(k) | Removes incident edges, then the node |
//!
//! Traversal algorithms live in [`crate::services::GraphService`] and
//! only use these primitives, so every backend shares the same BFS.

use crate::Result;
use crate::models::graph::{EdgeType, KnowledgeEdge, KnowledgeNode, NodeId, NodeType};
use std::collections::HashMap;

/// Trait for graph layer backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn GraphBackend>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - Return edges in insertion order so traversals are deterministic
pub trait GraphBackend: Send + Sync {
    /// Stores a node. A node with the same ID is replaced (its `created_at` is kept).
    ///
    /// The node must already carry a non-empty ID and a creation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn store_node(&self, node: &KnowledgeNode) -> Result<()>;

    /// Retrieves a node by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    fn get_node(&self, id: &NodeId) -> Result<Option<KnowledgeNode>>;

    /// Retrieves several nodes, skipping IDs that do not exist.
    ///
    /// Results follow the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<KnowledgeNode>>;

    /// Inserts an edge and returns its surrogate ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn store_edge(&self, edge: &KnowledgeEdge) -> Result<i64>;

    /// Returns every edge where `id` is source or target, optionally
    /// restricted to `edge_types`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query operation fails.
    fn get_edges(&self, id: &NodeId, edge_types: Option<&[EdgeType]>) -> Result<Vec<KnowledgeEdge>>;

    /// Returns undirected neighbors for every node in `frontier`.
    ///
    /// Each frontier node maps to its neighbors in edge insertion order
    /// (duplicates possible when parallel edges exist). Frontier nodes
    /// without edges may be absent from the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the query operation fails.
    fn neighbors(
        &self,
        frontier: &[NodeId],
        edge_types: Option<&[EdgeType]>,
    ) -> Result<HashMap<NodeId, Vec<NodeId>>>;

    /// Deletes every edge touching `id`, then the node itself.
    ///
    /// Returns `true` if a node row was removed. Deleting a missing node is
    /// not an error (its dangling edges are still removed).
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion operation fails.
    fn delete_node(&self, id: &NodeId) -> Result<bool>;

    /// Returns statistics about the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    fn get_stats(&self) -> Result<GraphStats>;

    /// Clears all graph data.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    fn clear(&self) -> Result<()>;
}

/// Statistics about the knowledge graph.
#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    /// Total number of nodes.
    pub node_count: usize,
    /// Number of nodes by type.
    pub nodes_by_type: HashMap<NodeType, usize>,
    /// Total number of edges.
    pub edge_count: usize,
    /// Number of edges by type.
    pub edges_by_type: HashMap<EdgeType, usize>,
}

impl GraphStats {
    /// Average number of edge endpoints per node (0 for an empty graph).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_degree(&self) -> f64 {
        if self.node_count == 0 {
            0.0
        } else {
            (self.edge_count * 2) as f64 / self.node_count as f64
        }
    }
}
