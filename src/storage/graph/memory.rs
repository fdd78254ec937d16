//! In-memory graph backend for testing.
//!
//! Provides a fast, non-persistent implementation of [`GraphBackend`] for use
//! in unit tests and development scenarios. Neighbor queries scan the edge
//! list, so results match the `SQLite` backend's insertion order.

use crate::models::graph::{EdgeType, KnowledgeEdge, KnowledgeNode, NodeId};
use crate::storage::traits::graph::{GraphBackend, GraphStats};
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Nodes, edges, and the edge id sequence, guarded together.
#[derive(Debug, Default)]
struct GraphData {
    nodes: HashMap<NodeId, KnowledgeNode>,
    edges: Vec<KnowledgeEdge>,
    last_edge_id: i64,
}

/// In-memory graph backend for testing.
///
/// A single `RwLock` guards the whole graph, so readers share access and a
/// writer sees nodes and edges change together. Data is not persisted
/// between runs.
///
/// # Example
///
/// ```rust
/// use agentlore::storage::graph::InMemoryGraphBackend;
/// use agentlore::storage::GraphBackend;
///
/// let backend = InMemoryGraphBackend::new();
/// assert_eq!(backend.get_stats().unwrap().node_count, 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGraphBackend {
    data: RwLock<GraphData>,
}

impl InMemoryGraphBackend {
    /// Creates a new empty in-memory graph backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes stored.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.read().nodes.len()
    }

    /// Returns the number of edges stored.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphData> {
        self.data.read().unwrap_or_else(|poisoned| {
            Self::note_poison();
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphData> {
        self.data.write().unwrap_or_else(|poisoned| {
            Self::note_poison();
            PoisonError::into_inner(poisoned)
        })
    }

    fn note_poison() {
        tracing::warn!("in-memory graph lock was poisoned, recovering");
        metrics::counter!("graph_memory_lock_poison_recovery_total").increment(1);
    }

    fn type_allowed(edge: &KnowledgeEdge, edge_types: Option<&[EdgeType]>) -> bool {
        match edge_types {
            Some(types) if !types.is_empty() => types.contains(&edge.edge_type),
            _ => true,
        }
    }
}

impl GraphBackend for InMemoryGraphBackend {
    fn store_node(&self, node: &KnowledgeNode) -> Result<()> {
        {
            let mut data = self.write();
            let created_at = data
                .nodes
                .get(&node.id)
                .map_or(node.created_at, |existing| existing.created_at);
            let mut stored = node.clone();
            stored.created_at = created_at;
            data.nodes.insert(stored.id.clone(), stored);
        }

        metrics::counter!("graph_nodes_stored_total").increment(1);
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<KnowledgeNode>> {
        Ok(self.read().nodes.get(id).cloned())
    }

    fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<KnowledgeNode>> {
        let data = self.read();
        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| data.nodes.get(id).cloned())
            .collect())
    }

    fn store_edge(&self, edge: &KnowledgeEdge) -> Result<i64> {
        let id = {
            let mut data = self.write();
            data.last_edge_id += 1;
            let id = data.last_edge_id;
            let mut stored = edge.clone();
            stored.id = Some(id);
            data.edges.push(stored);
            id
        };

        metrics::counter!("graph_edges_stored_total").increment(1);
        Ok(id)
    }

    fn get_edges(&self, id: &NodeId, edge_types: Option<&[EdgeType]>) -> Result<Vec<KnowledgeEdge>> {
        Ok(self
            .read()
            .edges
            .iter()
            .filter(|e| e.touches(id) && Self::type_allowed(e, edge_types))
            .cloned()
            .collect())
    }

    fn neighbors(
        &self,
        frontier: &[NodeId],
        edge_types: Option<&[EdgeType]>,
    ) -> Result<HashMap<NodeId, Vec<NodeId>>> {
        let data = self.read();
        let members: HashSet<&NodeId> = frontier.iter().collect();
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for edge in data.edges.iter().filter(|e| Self::type_allowed(e, edge_types)) {
            if members.contains(&edge.source_id) {
                adjacency
                    .entry(edge.source_id.clone())
                    .or_default()
                    .push(edge.target_id.clone());
            }
            if members.contains(&edge.target_id) {
                adjacency
                    .entry(edge.target_id.clone())
                    .or_default()
                    .push(edge.source_id.clone());
            }
        }

        Ok(adjacency)
    }

    fn delete_node(&self, id: &NodeId) -> Result<bool> {
        let (removed, edges_removed) = {
            let mut data = self.write();
            let before = data.edges.len();
            data.edges.retain(|e| !e.touches(id));
            let edges_removed = before - data.edges.len();
            (data.nodes.remove(id).is_some(), edges_removed)
        };

        metrics::counter!("graph_edges_deleted_total")
            .increment(u64::try_from(edges_removed).unwrap_or(u64::MAX));
        if removed {
            metrics::counter!("graph_nodes_deleted_total").increment(1);
        }
        Ok(removed)
    }

    fn get_stats(&self) -> Result<GraphStats> {
        let data = self.read();

        let mut stats = GraphStats {
            node_count: data.nodes.len(),
            edge_count: data.edges.len(),
            ..GraphStats::default()
        };
        for node in data.nodes.values() {
            *stats.nodes_by_type.entry(node.node_type).or_insert(0) += 1;
        }
        for edge in &data.edges {
            *stats.edges_by_type.entry(edge.edge_type).or_insert(0) += 1;
        }

        Ok(stats)
    }

    fn clear(&self) -> Result<()> {
        {
            let mut data = self.write();
            data.edges.clear();
            data.nodes.clear();
        }

        metrics::counter!("graph_cleared_total").increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::graph::NodeType;
    use std::sync::Arc;
    use std::thread;

    fn node(id: &str, created_at: i64) -> KnowledgeNode {
        KnowledgeNode::new(NodeType::File)
            .with_id(id)
            .with_created_at(created_at)
    }

    #[test]
    fn test_store_and_get_node() {
        let backend = InMemoryGraphBackend::new();
        backend.store_node(&node("file:a.rs", 10)).unwrap();

        assert_eq!(backend.node_count(), 1);
        let loaded = backend.get_node(&NodeId::new("file:a.rs")).unwrap().unwrap();
        assert_eq!(loaded.created_at, 10);
    }

    #[test]
    fn test_upsert_keeps_original_created_at() {
        let backend = InMemoryGraphBackend::new();
        backend.store_node(&node("n", 10)).unwrap();
        backend
            .store_node(&node("n", 99).with_property("size", 3.0))
            .unwrap();

        let loaded = backend.get_node(&NodeId::new("n")).unwrap().unwrap();
        assert_eq!(loaded.created_at, 10);
        assert!(loaded.properties.contains_key("size"));
        assert_eq!(backend.node_count(), 1);
    }

    #[test]
    fn test_edge_ids_are_sequential() {
        let backend = InMemoryGraphBackend::new();
        let edge = KnowledgeEdge::new(NodeId::new("a"), NodeId::new("b"), EdgeType::UsedBy);

        assert_eq!(backend.store_edge(&edge).unwrap(), 1);
        assert_eq!(backend.store_edge(&edge).unwrap(), 2);
        assert_eq!(backend.edge_count(), 2);
    }

    #[test]
    fn test_neighbors_matches_insertion_order() {
        let backend = InMemoryGraphBackend::new();
        for (from, to) in [("a", "b"), ("c", "a"), ("a", "d")] {
            backend
                .store_edge(&KnowledgeEdge::new(
                    NodeId::new(from),
                    NodeId::new(to),
                    EdgeType::SimilarTo,
                ))
                .unwrap();
        }

        let adjacency = backend.neighbors(&[NodeId::new("a")], None).unwrap();
        let ids: Vec<&str> = adjacency[&NodeId::new("a")]
            .iter()
            .map(NodeId::as_str)
            .collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_delete_node_removes_dangling_edges() {
        let backend = InMemoryGraphBackend::new();
        backend
            .store_edge(&KnowledgeEdge::new(
                NodeId::new("ghost"),
                NodeId::new("b"),
                EdgeType::DependsOn,
            ))
            .unwrap();

        // No node row, but its edges still go.
        assert!(!backend.delete_node(&NodeId::new("ghost")).unwrap());
        assert_eq!(backend.edge_count(), 0);
    }

    #[test]
    fn test_clear() {
        let backend = InMemoryGraphBackend::new();
        backend.store_node(&node("n", 1)).unwrap();
        backend
            .store_edge(&KnowledgeEdge::new(
                NodeId::new("n"),
                NodeId::new("m"),
                EdgeType::Modifies,
            ))
            .unwrap();

        backend.clear().unwrap();
        let stats = backend.get_stats().unwrap();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.edge_count, 0);
    }

    #[test]
    fn test_concurrent_stats_and_deletes_finish() {
        let backend = Arc::new(InMemoryGraphBackend::new());
        for i in 0..50 {
            let id = format!("n{i}");
            backend.store_node(&node(&id, 1)).unwrap();
            backend
                .store_edge(&KnowledgeEdge::new(
                    NodeId::new(id),
                    NodeId::new("hub"),
                    EdgeType::Modifies,
                ))
                .unwrap();
        }

        let deleter = {
            let backend = Arc::clone(&backend);
            thread::spawn(move || {
                for i in 0..50 {
                    backend.delete_node(&NodeId::new(format!("n{i}"))).unwrap();
                }
            })
        };
        let reader = {
            let backend = Arc::clone(&backend);
            thread::spawn(move || {
                for _ in 0..200 {
                    let stats = backend.get_stats().unwrap();
                    assert_eq!(stats.node_count, stats.edge_count);
                }
            })
        };
        deleter.join().unwrap();
        reader.join().unwrap();

        assert_eq!(backend.node_count(), 0);
        assert_eq!(backend.edge_count(), 0);
    }

    #[test]
    #[allow(clippy::panic)]
    fn test_poisoned_lock_is_recovered() {
        let backend = Arc::new(InMemoryGraphBackend::new());
        backend.store_node(&node("survivor", 7)).unwrap();

        let poisoner = Arc::clone(&backend);
        let outcome = thread::spawn(move || {
            let _guard = poisoner.data.write().unwrap();
            panic!("poison the graph lock");
        })
        .join();
        assert!(outcome.is_err());
        assert!(backend.data.is_poisoned());

        assert_eq!(backend.node_count(), 1);
        assert!(backend.get_node(&NodeId::new("survivor")).unwrap().is_some());
        backend.store_node(&node("late", 8)).unwrap();
        assert_eq!(backend.get_stats().unwrap().node_count, 2);
    }
}
