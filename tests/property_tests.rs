//! Property-based tests for graph traversal and similarity metrics.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Neighbor discovery is symmetric
//! - Expanding more hops never loses nodes
//! - Path search is reflexive
//! - Jaccard and Levenshtein similarities stay within bounds
//! - Agent selection is deterministic

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use agentlore::models::graph::{EdgeType, KnowledgeEdge, KnowledgeNode, NodeId, NodeType};
use agentlore::services::similarity::{
    jaccard_similarity, levenshtein_distance, normalized_levenshtein_similarity,
};
use agentlore::storage::graph::InMemoryGraphBackend;
use agentlore::{CancellationToken, GraphService, TaskExecution, select_better_agent};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

const NODE_COUNT: usize = 8;

/// Builds a graph over nodes `n0..n7` with the given undirected edge list.
fn build_graph(edges: &[(usize, usize)]) -> GraphService<InMemoryGraphBackend> {
    let service = GraphService::new(InMemoryGraphBackend::new());
    for i in 0..NODE_COUNT {
        service
            .add_node(KnowledgeNode::new(NodeType::Task).with_id(format!("n{i}")))
            .unwrap();
    }
    for &(a, b) in edges {
        service
            .add_edge(KnowledgeEdge::new(
                NodeId::new(format!("n{a}")),
                NodeId::new(format!("n{b}")),
                EdgeType::DependsOn,
            ))
            .unwrap();
    }
    service
}

fn related_ids(
    service: &GraphService<InMemoryGraphBackend>,
    id: usize,
    hops: i32,
) -> HashSet<String> {
    service
        .get_related(&CancellationToken::new(), &NodeId::new(format!("n{id}")), hops, None)
        .unwrap()
        .into_iter()
        .map(|n| n.id.as_str().to_string())
        .collect()
}

fn edge_list() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..NODE_COUNT, 0..NODE_COUNT), 0..16)
}

proptest! {
    /// Property: for every edge (A, B), each end is a 1-hop neighbor of the other.
    #[test]
    fn prop_bfs_symmetry(edges in edge_list()) {
        let service = build_graph(&edges);
        for &(a, b) in &edges {
            if a == b {
                continue;
            }
            let id_a = format!("n{a}");
            let id_b = format!("n{b}");
            prop_assert!(related_ids(&service, a, 1).contains(&id_b));
            prop_assert!(related_ids(&service, b, 1).contains(&id_a));
        }
    }

    /// Property: related(h1) is a subset of related(h2) for h1 < h2, and
    /// related(0) equals related(1).
    #[test]
    fn prop_hop_monotonicity(edges in edge_list(), start in 0..NODE_COUNT, h1 in 0i32..5, extra in 1i32..5) {
        let service = build_graph(&edges);
        let near = related_ids(&service, start, h1);
        let far = related_ids(&service, start, h1 + extra);
        prop_assert!(near.is_subset(&far));
        prop_assert_eq!(related_ids(&service, start, 0), related_ids(&service, start, 1));
        let start_id = format!("n{start}");
        prop_assert!(!far.contains(&start_id));
    }

    /// Property: a path from a node to itself is just that node.
    #[test]
    fn prop_path_reflexivity(edges in edge_list(), node in 0..NODE_COUNT + 2) {
        let service = build_graph(&edges);
        let id = NodeId::new(format!("n{node}"));
        let path = service.find_path(&CancellationToken::new(), &id, &id).unwrap();
        if node < NODE_COUNT {
            let path = path.unwrap();
            prop_assert_eq!(path.len(), 1);
            prop_assert_eq!(&path[0].id, &id);
        } else {
            prop_assert!(path.is_none());
        }
    }

    /// Property: a found path starts and ends at the requested nodes and
    /// is never longer than the node count.
    #[test]
    fn prop_path_endpoints(edges in edge_list(), from in 0..NODE_COUNT, to in 0..NODE_COUNT) {
        let service = build_graph(&edges);
        let from_id = NodeId::new(format!("n{from}"));
        let to_id = NodeId::new(format!("n{to}"));
        if let Some(path) = service.find_path(&CancellationToken::new(), &from_id, &to_id).unwrap() {
            prop_assert_eq!(&path[0].id, &from_id);
            prop_assert_eq!(&path[path.len() - 1].id, &to_id);
            prop_assert!(path.len() <= NODE_COUNT);
        }
    }

    /// Property: after deleting a node, no remaining edge references it.
    #[test]
    fn prop_delete_cascade(edges in edge_list(), victim in 0..NODE_COUNT) {
        let service = build_graph(&edges);
        let victim_id = NodeId::new(format!("n{victim}"));
        service.delete_node(&CancellationToken::new(), &victim_id).unwrap();
        for i in 0..NODE_COUNT {
            let edges = service.get_edges(&NodeId::new(format!("n{i}")), None).unwrap();
            prop_assert!(edges.iter().all(|e| !e.touches(&victim_id)));
        }
    }

    /// Property: Jaccard similarity lies in [0, 1] and is 1 for a non-empty set with itself.
    #[test]
    fn prop_jaccard_bounds(
        a in prop::collection::btree_set("[a-z]{1,4}", 0..8),
        b in prop::collection::btree_set("[a-z]{1,4}", 0..8),
    ) {
        let j = jaccard_similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&j));
        prop_assert!((j - jaccard_similarity(&b, &a)).abs() < f64::EPSILON);
        if a.is_empty() {
            prop_assert!(jaccard_similarity(&a, &a).abs() < f64::EPSILON);
        } else {
            prop_assert!((jaccard_similarity(&a, &a) - 1.0).abs() < f64::EPSILON);
        }
        let empty: BTreeSet<String> = BTreeSet::new();
        prop_assert!(jaccard_similarity(&empty, &empty).abs() < f64::EPSILON);
    }

    /// Property: a string is fully similar to itself and the distance is a
    /// symmetric count bounded by the longer length.
    #[test]
    fn prop_levenshtein(a in "\\PC{0,12}", b in "\\PC{0,12}") {
        prop_assert!((normalized_levenshtein_similarity(&a, &a) - 1.0).abs() < f64::EPSILON);

        let d = levenshtein_distance(&a, &b);
        prop_assert_eq!(d, levenshtein_distance(&b, &a));
        prop_assert!(d <= a.chars().count().max(b.chars().count()));

        let sim = normalized_levenshtein_similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&sim));
    }

    /// Property: one substitution on a five-character string is distance 1.
    #[test]
    fn prop_single_edit(s in "[a-z]{5}", idx in 0usize..5) {
        let mut chars: Vec<char> = s.chars().collect();
        chars[idx] = if chars[idx] == 'z' { 'a' } else { 'z' };
        let edited: String = chars.into_iter().collect();
        prop_assert_eq!(levenshtein_distance(&s, &edited), 1);
    }

    /// Property: agents with equal rate and run count resolve to the
    /// lexicographically smaller name, whatever the history order.
    #[test]
    fn prop_selection_determinism(
        names in prop::collection::btree_set("[a-z]{3,6}", 2..5),
        runs in 1usize..4,
        reverse in any::<bool>(),
    ) {
        let mut history = Vec::new();
        for name in &names {
            for _ in 0..runs {
                history.push(TaskExecution::new("plan.md", "1", "Task", name.as_str()).with_success(true));
            }
        }
        if reverse {
            history.reverse();
        }

        let selection = select_better_agent("current-agent", &history, "");
        prop_assert_eq!(&selection.agent, names.iter().next().unwrap());
    }
}
