//! Graph service for high-level knowledge graph operations.
//!
//! Provides a service layer wrapping [`GraphBackend`] with validation,
//! multi-hop expansion, shortest paths, and recording of execution outcomes.
//!
//! # Example
//!
//! ```rust
//! use agentlore::CancellationToken;
//! use agentlore::models::graph::{EdgeType, KnowledgeEdge, KnowledgeNode, NodeId, NodeType};
//! use agentlore::services::GraphService;
//! use agentlore::storage::graph::InMemoryGraphBackend;
//!
//! let service = GraphService::new(InMemoryGraphBackend::new());
//! let cancel = CancellationToken::new();
//!
//! let task = service.add_node(KnowledgeNode::new(NodeType::Task).with_id("task:plan.md#1")).unwrap();
//! let file = service.add_node(KnowledgeNode::new(NodeType::File).with_id("file:src/lib.rs")).unwrap();
//! service
//!     .add_edge(KnowledgeEdge::new(task.id.clone(), file.id.clone(), EdgeType::Modifies))
//!     .unwrap();
//!
//! let related = service.get_related(&cancel, &file.id, 1, None).unwrap();
//! assert_eq!(related[0].id, task.id);
//! ```

use crate::models::graph::{EdgeType, KnowledgeEdge, KnowledgeNode, NodeId, NodeType};
use crate::models::TaskExecution;
use crate::services::similarity::normalize_paths;
use crate::storage::traits::graph::{GraphBackend, GraphStats};
use crate::{CancellationToken, Error, Result, current_timestamp, ensure_not_cancelled};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Upper bound on BFS depth for [`GraphService::get_related`].
pub const MAX_HOPS: usize = 10;

/// High-level service for knowledge graph operations.
///
/// # Thread Safety
///
/// The service is thread-safe when the underlying backend is thread-safe.
/// Both [`SqliteGraphBackend`](crate::storage::graph::SqliteGraphBackend) and
/// [`InMemoryGraphBackend`](crate::storage::graph::InMemoryGraphBackend) are thread-safe.
///
/// Traversals hold no lock across hops; a concurrent writer may change the
/// graph between two BFS levels.
pub struct GraphService<B: GraphBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: GraphBackend> GraphService<B> {
    /// Creates a new graph service with the given backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}

impl<B: GraphBackend + ?Sized> GraphService<B> {
    /// Creates a new graph service with a shared backend.
    #[must_use]
    pub const fn with_shared_backend(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Returns a reference to the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Stores a node, generating a UUID when the ID is empty and stamping
    /// `created_at` when it is 0.
    ///
    /// Storing an existing ID replaces its type and properties but keeps the
    /// original `created_at`. Returns the node as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    #[instrument(skip(self, node), fields(node_type = %node.node_type))]
    pub fn add_node(&self, mut node: KnowledgeNode) -> Result<KnowledgeNode> {
        if node.id.is_empty() {
            node.id = NodeId::generate();
        }
        if node.created_at == 0 {
            node.created_at = current_timestamp();
        }

        self.backend.store_node(&node)?;
        Ok(self.backend.get_node(&node.id)?.unwrap_or(node))
    }

    /// Stores an edge and returns it with its surrogate ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either endpoint is empty or the
    /// weight is not finite, or an error if the storage operation fails.
    #[instrument(skip(self, edge), fields(source = %edge.source_id, target = %edge.target_id, edge_type = %edge.edge_type))]
    pub fn add_edge(&self, mut edge: KnowledgeEdge) -> Result<KnowledgeEdge> {
        if edge.source_id.is_empty() || edge.target_id.is_empty() {
            return Err(Error::InvalidInput(
                "edge source and target ids are required".to_string(),
            ));
        }
        if !edge.weight.is_finite() {
            return Err(Error::InvalidInput(format!(
                "edge weight must be finite, got {}",
                edge.weight
            )));
        }
        if edge.created_at == 0 {
            edge.created_at = current_timestamp();
        }

        edge.id = Some(self.backend.store_edge(&edge)?);
        Ok(edge)
    }

    /// Retrieves a node by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn get_node(&self, id: &NodeId) -> Result<Option<KnowledgeNode>> {
        self.backend.get_node(id)
    }

    /// Returns every edge touching `id`, optionally filtered by type.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_edges(&self, id: &NodeId, edge_types: Option<&[EdgeType]>) -> Result<Vec<KnowledgeEdge>> {
        self.backend.get_edges(id, edge_types)
    }

    /// Finds nodes within `hops` undirected steps of `id`.
    ///
    /// `hops <= 0` is treated as 1 and values above [`MAX_HOPS`] are clamped.
    /// The start node is excluded; every other reachable node appears once,
    /// ordered by the hop at which it was first discovered. IDs without a
    /// node row are traversed but left out of the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` already fired, or an error if
    /// a neighbor query fails.
    #[instrument(skip(self, cancel), fields(node_id = %id))]
    pub fn get_related(
        &self,
        cancel: &CancellationToken,
        id: &NodeId,
        hops: i32,
        edge_types: Option<&[EdgeType]>,
    ) -> Result<Vec<KnowledgeNode>> {
        ensure_not_cancelled(cancel, "get_related")?;
        let start = Instant::now();
        let max_hops = clamp_hops(hops);

        let mut visited: HashSet<NodeId> = HashSet::from([id.clone()]);
        let mut discovered: Vec<NodeId> = Vec::new();
        let mut frontier = vec![id.clone()];

        for _ in 0..max_hops {
            if frontier.is_empty() {
                break;
            }
            let adjacency = self.backend.neighbors(&frontier, edge_types)?;
            let mut next = Vec::new();
            for node in &frontier {
                for neighbor in adjacency.get(node).into_iter().flatten() {
                    if visited.insert(neighbor.clone()) {
                        next.push(neighbor.clone());
                        discovered.push(neighbor.clone());
                    }
                }
            }
            frontier = next;
        }

        let related = self.backend.get_nodes(&discovered)?;

        metrics::counter!("graph_traversals_total", "kind" => "related").increment(1);
        metrics::histogram!("graph_traversal_duration_ms", "kind" => "related")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(hops = max_hops, found = related.len(), "expanded related nodes");

        Ok(related)
    }

    /// Finds a shortest undirected path from `from` to `to`, inclusive.
    ///
    /// Returns `None` when the target does not exist or is unreachable.
    /// `from == to` yields a single-node path if the node exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` already fired, or an error if
    /// a lookup fails.
    #[instrument(skip(self, cancel), fields(from = %from, to = %to))]
    pub fn find_path(
        &self,
        cancel: &CancellationToken,
        from: &NodeId,
        to: &NodeId,
    ) -> Result<Option<Vec<KnowledgeNode>>> {
        ensure_not_cancelled(cancel, "find_path")?;

        if from == to {
            return Ok(self.backend.get_node(from)?.map(|node| vec![node]));
        }
        if self.backend.get_node(to)?.is_none() {
            return Ok(None);
        }

        let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
        let mut visited: HashSet<NodeId> = HashSet::from([from.clone()]);
        let mut frontier = vec![from.clone()];

        while !frontier.is_empty() {
            let adjacency = self.backend.neighbors(&frontier, None)?;
            let mut next = Vec::new();
            for node in &frontier {
                for neighbor in adjacency.get(node).into_iter().flatten() {
                    if !visited.insert(neighbor.clone()) {
                        continue;
                    }
                    parents.insert(neighbor.clone(), node.clone());
                    if neighbor == to {
                        let path = reconstruct_path(&parents, from, to);
                        metrics::counter!("graph_traversals_total", "kind" => "path").increment(1);
                        return Ok(Some(self.backend.get_nodes(&path)?));
                    }
                    next.push(neighbor.clone());
                }
            }
            frontier = next;
        }

        metrics::counter!("graph_traversals_total", "kind" => "path").increment(1);
        Ok(None)
    }

    /// Deletes a node and every edge touching it. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` already fired, or an error if
    /// the deletion fails.
    #[instrument(skip(self, cancel), fields(node_id = %id))]
    pub fn delete_node(&self, cancel: &CancellationToken, id: &NodeId) -> Result<bool> {
        ensure_not_cancelled(cancel, "delete_node")?;
        self.backend.delete_node(id)
    }

    /// Returns node and edge counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stats(&self) -> Result<GraphStats> {
        self.backend.get_stats()
    }

    /// Records the facts of one execution: task, agent, and file nodes, a
    /// `modifies` edge per file, and a `succeeded_with` or `caused_failure`
    /// edge to the agent.
    ///
    /// # Errors
    ///
    /// Returns an error if any store operation fails.
    #[instrument(skip(self, execution), fields(plan_file = %execution.plan_file, task_number = %execution.task_number))]
    pub fn record_execution(&self, execution: &TaskExecution) -> Result<()> {
        let task = self.add_node(
            KnowledgeNode::new(NodeType::Task)
                .with_id(NodeId::for_task(&execution.plan_file, &execution.task_number))
                .with_property("name", execution.task_name.as_str())
                .with_property("plan_file", execution.plan_file.as_str())
                .with_property("task_number", execution.task_number.as_str()),
        )?;

        for path in normalize_paths(execution.files.as_slice()) {
            let file = self.add_node(
                KnowledgeNode::new(NodeType::File)
                    .with_id(NodeId::for_file(&path))
                    .with_property("path", path.as_str()),
            )?;
            self.add_edge(KnowledgeEdge::new(task.id.clone(), file.id, EdgeType::Modifies))?;
        }

        if !execution.agent.is_empty() {
            let agent = self.add_node(
                KnowledgeNode::new(NodeType::Agent)
                    .with_id(NodeId::for_agent(&execution.agent))
                    .with_property("name", execution.agent.as_str()),
            )?;
            let edge_type = if execution.success {
                EdgeType::SucceededWith
            } else {
                EdgeType::CausedFailure
            };
            let mut edge = KnowledgeEdge::new(task.id, agent.id, edge_type)
                .with_metadata("run_number", i64::from(execution.run_number));
            if execution.id > 0 {
                edge = edge.with_metadata("execution_id", execution.id);
            }
            self.add_edge(edge)?;
        }

        metrics::counter!("graph_executions_recorded_total").increment(1);
        Ok(())
    }
}

fn clamp_hops(hops: i32) -> usize {
    usize::try_from(hops).unwrap_or(0).clamp(1, MAX_HOPS)
}

fn reconstruct_path(parents: &HashMap<NodeId, NodeId>, from: &NodeId, to: &NodeId) -> Vec<NodeId> {
    let mut path = vec![to.clone()];
    let mut current = to;
    while current != from {
        match parents.get(current) {
            Some(parent) => {
                path.push(parent.clone());
                current = parent;
            },
            None => break,
        }
    }
    path.reverse();
    path
}
