//! `SQLite` graph backend for knowledge graph storage.
//!
//! Stores nodes and directed edges in two tables. Traversal is driven by
//! [`crate::services::GraphService`], which issues one batched
//! [`GraphBackend::neighbors`] query per BFS hop.

// SQLite returns i64 for counts; counts are non-negative.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::significant_drop_tightening)]

use crate::models::graph::{EdgeType, KnowledgeEdge, KnowledgeNode, NodeId, NodeType, Properties};
use crate::storage::sqlite::{
    acquire_lock, json_column, numbered_placeholders, open_file, open_in_memory, sql_error,
};
use crate::storage::traits::graph::{GraphBackend, GraphStats};
use crate::{Error, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::instrument;

/// Maximum number of IDs bound into one `IN (...)` clause.
const MAX_IDS_PER_QUERY: usize = 400;

/// `SQLite`-based graph backend.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and `busy_timeout`
/// handle concurrent access gracefully.
///
/// # Schema
///
/// - `graph_nodes`: `id`, `node_type`, `properties` (JSON), `created_at`
/// - `graph_edges`: surrogate `id`, `source_id`, `target_id`, `edge_type`,
///   `weight`, `metadata` (JSON), `created_at`
///
/// No foreign keys: edges may reference nodes that were never stored.
pub struct SqliteGraphBackend {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteGraphBackend {
    /// Creates a new `SQLite` graph backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_file(&db_path, "open_graph_sqlite")?;

        let backend = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };

        backend.initialize()?;
        Ok(backend)
    }

    /// Creates an in-memory `SQLite` graph backend (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = open_in_memory("open_graph_sqlite_memory")?;

        let backend = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };

        backend.initialize()?;
        Ok(backend)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS graph_nodes (
                id TEXT PRIMARY KEY,
                node_type TEXT NOT NULL,
                properties TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS graph_edges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                edge_type TEXT NOT NULL,
                weight REAL NOT NULL DEFAULT 1.0,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_graph_nodes_type ON graph_nodes(node_type);
            CREATE INDEX IF NOT EXISTS idx_graph_edges_source ON graph_edges(source_id);
            CREATE INDEX IF NOT EXISTS idx_graph_edges_target ON graph_edges(target_id);
            CREATE INDEX IF NOT EXISTS idx_graph_edges_triple
                ON graph_edges(source_id, target_id, edge_type);",
        )
        .map_err(sql_error("create_graph_tables"))
    }

    /// Parses a node from a database row.
    fn parse_node_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeNode> {
        let id: String = row.get("id")?;
        let node_type_str: String = row.get("node_type")?;
        let properties_json: String = row.get("properties")?;
        let created_at: i64 = row.get("created_at")?;

        let node_type = NodeType::parse(&node_type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                format!("unknown node type: {node_type_str}").into(),
            )
        })?;
        let properties: Properties = json_column(&properties_json, 2)?;

        Ok(KnowledgeNode {
            id: NodeId::new(id),
            node_type,
            properties,
            created_at,
        })
    }

    /// Parses an edge from a database row.
    fn parse_edge_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeEdge> {
        let id: i64 = row.get("id")?;
        let source_id: String = row.get("source_id")?;
        let target_id: String = row.get("target_id")?;
        let edge_type_str: String = row.get("edge_type")?;
        let weight: f64 = row.get("weight")?;
        let metadata_json: String = row.get("metadata")?;
        let created_at: i64 = row.get("created_at")?;

        let edge_type = EdgeType::parse(&edge_type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Text,
                format!("unknown edge type: {edge_type_str}").into(),
            )
        })?;
        let metadata: Properties = json_column(&metadata_json, 5)?;

        Ok(KnowledgeEdge {
            id: Some(id),
            source_id: NodeId::new(source_id),
            target_id: NodeId::new(target_id),
            edge_type,
            weight,
            metadata,
            created_at,
        })
    }

    /// Builds `AND edge_type IN (...)` for an optional type filter, binding
    /// from placeholder `?start`.
    fn edge_type_clause(edge_types: Option<&[EdgeType]>, start: usize) -> String {
        match edge_types {
            Some(types) if !types.is_empty() => format!(
                " AND edge_type IN ({})",
                numbered_placeholders(start, types.len())
            ),
            _ => String::new(),
        }
    }

    fn serialize_bag(bag: &Properties, operation: &str) -> Result<String> {
        serde_json::to_string(bag).map_err(|e| Error::OperationFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        })
    }

    fn count(conn: &Connection, sql: &str, operation: &str) -> Result<usize> {
        let count: i64 = conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(sql_error(operation))?;
        Ok(count as usize)
    }

    fn count_by_type(conn: &Connection, sql: &str, operation: &str) -> Result<Vec<(String, usize)>> {
        let mut stmt = conn.prepare(sql).map_err(sql_error(operation))?;
        let rows = stmt
            .query_map([], |row| {
                let type_str: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((type_str, count as usize))
            })
            .map_err(sql_error(operation))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_error(operation))
    }
}

impl GraphBackend for SqliteGraphBackend {
    #[instrument(skip(self, node), fields(node_id = %node.id))]
    fn store_node(&self, node: &KnowledgeNode) -> Result<()> {
        let properties_json = Self::serialize_bag(&node.properties, "serialize_node_properties")?;
        let conn = acquire_lock(&self.conn);

        conn.execute(
            "INSERT INTO graph_nodes (id, node_type, properties, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                node_type = excluded.node_type,
                properties = excluded.properties",
            params![
                node.id.as_str(),
                node.node_type.as_str(),
                properties_json,
                node.created_at
            ],
        )
        .map_err(sql_error("store_node"))?;

        metrics::counter!("graph_nodes_stored_total").increment(1);
        Ok(())
    }

    #[instrument(skip(self), fields(node_id = %id))]
    fn get_node(&self, id: &NodeId) -> Result<Option<KnowledgeNode>> {
        let conn = acquire_lock(&self.conn);

        conn.query_row(
            "SELECT id, node_type, properties, created_at FROM graph_nodes WHERE id = ?1",
            params![id.as_str()],
            Self::parse_node_row,
        )
        .optional()
        .map_err(sql_error("get_node"))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<KnowledgeNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = acquire_lock(&self.conn);
        let mut found: HashMap<NodeId, KnowledgeNode> = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let sql = format!(
                "SELECT id, node_type, properties, created_at FROM graph_nodes WHERE id IN ({})",
                numbered_placeholders(1, chunk.len())
            );
            let mut stmt = conn.prepare(&sql).map_err(sql_error("get_nodes_prepare"))?;
            let params: Vec<&dyn ToSql> = chunk.iter().map(|id| id as &dyn ToSql).collect();
            let rows = stmt
                .query_map(params.as_slice(), Self::parse_node_row)
                .map_err(sql_error("get_nodes"))?;
            for row in rows {
                let node = row.map_err(sql_error("get_nodes_row"))?;
                found.insert(node.id.clone(), node);
            }
        }

        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| found.get(id).cloned())
            .collect())
    }

    #[instrument(skip(self, edge), fields(source = %edge.source_id, target = %edge.target_id, edge_type = %edge.edge_type))]
    fn store_edge(&self, edge: &KnowledgeEdge) -> Result<i64> {
        let metadata_json = Self::serialize_bag(&edge.metadata, "serialize_edge_metadata")?;
        let conn = acquire_lock(&self.conn);

        conn.execute(
            "INSERT INTO graph_edges (source_id, target_id, edge_type, weight, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                edge.source_id.as_str(),
                edge.target_id.as_str(),
                edge.edge_type.as_str(),
                edge.weight,
                metadata_json,
                edge.created_at
            ],
        )
        .map_err(sql_error("store_edge"))?;

        metrics::counter!("graph_edges_stored_total").increment(1);
        Ok(conn.last_insert_rowid())
    }

    #[instrument(skip(self), fields(node_id = %id))]
    fn get_edges(&self, id: &NodeId, edge_types: Option<&[EdgeType]>) -> Result<Vec<KnowledgeEdge>> {
        let conn = acquire_lock(&self.conn);

        let sql = format!(
            "SELECT id, source_id, target_id, edge_type, weight, metadata, created_at
             FROM graph_edges
             WHERE (source_id = ?1 OR target_id = ?1){}
             ORDER BY id",
            Self::edge_type_clause(edge_types, 2)
        );

        let mut params: Vec<&dyn ToSql> = vec![id as &dyn ToSql];
        let type_strs: Vec<&str> = edge_types
            .unwrap_or_default()
            .iter()
            .map(EdgeType::as_str)
            .collect();
        params.extend(type_strs.iter().map(|t| t as &dyn ToSql));

        let mut stmt = conn.prepare(&sql).map_err(sql_error("get_edges_prepare"))?;
        let rows = stmt
            .query_map(params.as_slice(), Self::parse_edge_row)
            .map_err(sql_error("get_edges"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_error("get_edges_row"))
    }

    #[instrument(skip(self, frontier), fields(frontier = frontier.len()))]
    fn neighbors(
        &self,
        frontier: &[NodeId],
        edge_types: Option<&[EdgeType]>,
    ) -> Result<HashMap<NodeId, Vec<NodeId>>> {
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        if frontier.is_empty() {
            return Ok(adjacency);
        }

        let conn = acquire_lock(&self.conn);
        let type_strs: Vec<&str> = edge_types
            .unwrap_or_default()
            .iter()
            .map(EdgeType::as_str)
            .collect();

        for chunk in frontier.chunks(MAX_IDS_PER_QUERY) {
            let in_list = numbered_placeholders(1, chunk.len());
            let sql = format!(
                "SELECT source_id, target_id FROM graph_edges
                 WHERE (source_id IN ({in_list}) OR target_id IN ({in_list})){}
                 ORDER BY id",
                Self::edge_type_clause(edge_types, chunk.len() + 1)
            );

            let mut params: Vec<&dyn ToSql> = chunk.iter().map(|id| id as &dyn ToSql).collect();
            params.extend(type_strs.iter().map(|t| t as &dyn ToSql));

            let members: HashSet<&NodeId> = chunk.iter().collect();
            let mut stmt = conn.prepare(&sql).map_err(sql_error("neighbors_prepare"))?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    let source: String = row.get(0)?;
                    let target: String = row.get(1)?;
                    Ok((NodeId::new(source), NodeId::new(target)))
                })
                .map_err(sql_error("neighbors"))?;

            for row in rows {
                let (source, target) = row.map_err(sql_error("neighbors_row"))?;
                if members.contains(&source) {
                    adjacency
                        .entry(source.clone())
                        .or_default()
                        .push(target.clone());
                }
                if members.contains(&target) {
                    adjacency.entry(target).or_default().push(source);
                }
            }
        }

        Ok(adjacency)
    }

    #[instrument(skip(self), fields(node_id = %id))]
    fn delete_node(&self, id: &NodeId) -> Result<bool> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(sql_error("delete_node_begin"))?;

        let edges = tx
            .execute(
                "DELETE FROM graph_edges WHERE source_id = ?1 OR target_id = ?1",
                params![id.as_str()],
            )
            .map_err(sql_error("delete_node_edges"))?;
        let rows = tx
            .execute("DELETE FROM graph_nodes WHERE id = ?1", params![id.as_str()])
            .map_err(sql_error("delete_node"))?;

        tx.commit().map_err(sql_error("delete_node_commit"))?;

        metrics::counter!("graph_edges_deleted_total").increment(edges as u64);
        if rows > 0 {
            metrics::counter!("graph_nodes_deleted_total").increment(1);
        }
        Ok(rows > 0)
    }

    #[instrument(skip(self))]
    fn get_stats(&self) -> Result<GraphStats> {
        let conn = acquire_lock(&self.conn);

        let node_count = Self::count(&conn, "SELECT COUNT(*) FROM graph_nodes", "count_nodes")?;
        let edge_count = Self::count(&conn, "SELECT COUNT(*) FROM graph_edges", "count_edges")?;

        let nodes_by_type = Self::count_by_type(
            &conn,
            "SELECT node_type, COUNT(*) FROM graph_nodes GROUP BY node_type",
            "get_stats_nodes_by_type",
        )?
        .into_iter()
        .filter_map(|(t, n)| NodeType::parse(&t).map(|t| (t, n)))
        .collect();

        let edges_by_type = Self::count_by_type(
            &conn,
            "SELECT edge_type, COUNT(*) FROM graph_edges GROUP BY edge_type",
            "get_stats_edges_by_type",
        )?
        .into_iter()
        .filter_map(|(t, n)| EdgeType::parse(&t).map(|t| (t, n)))
        .collect();

        Ok(GraphStats {
            node_count,
            nodes_by_type,
            edge_count,
            edges_by_type,
        })
    }

    #[instrument(skip(self))]
    fn clear(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute_batch("DELETE FROM graph_edges; DELETE FROM graph_nodes;")
            .map_err(sql_error("clear_graph"))?;

        metrics::counter!("graph_cleared_total").increment(1);
        Ok(())
    }
}

impl ToSql for NodeId {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        self.as_str().to_sql()
    }
}

#[cfg(test)]
#[allow(clippy::redundant_clone)]
mod tests {
    use super::*;

    fn task(id: &str) -> KnowledgeNode {
        KnowledgeNode::new(NodeType::Task)
            .with_id(id)
            .with_property("name", id)
            .with_created_at(1_700_000_000)
    }

    fn edge(from: &str, to: &str, edge_type: EdgeType) -> KnowledgeEdge {
        let mut edge = KnowledgeEdge::new(NodeId::new(from), NodeId::new(to), edge_type);
        edge.created_at = 1_700_000_000;
        edge
    }

    #[test]
    fn test_store_and_get_node() {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        let node = task("task:plan.md#1").with_property("retries", 2_i64);

        backend.store_node(&node).unwrap();
        let loaded = backend.get_node(&node.id).unwrap().unwrap();

        assert_eq!(loaded, node);
        assert!(backend.get_node(&NodeId::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_node_upsert_keeps_created_at() {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        backend.store_node(&task("t1")).unwrap();

        let replacement = KnowledgeNode::new(NodeType::Pattern)
            .with_id("t1")
            .with_property("kind", "renamed")
            .with_created_at(1_800_000_000);
        backend.store_node(&replacement).unwrap();

        let loaded = backend.get_node(&NodeId::new("t1")).unwrap().unwrap();
        assert_eq!(loaded.node_type, NodeType::Pattern);
        assert_eq!(loaded.text_property("kind"), Some("renamed"));
        assert_eq!(loaded.created_at, 1_700_000_000);
    }

    #[test]
    fn test_get_nodes_skips_missing_and_keeps_order() {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        backend.store_node(&task("a")).unwrap();
        backend.store_node(&task("b")).unwrap();

        let ids = [NodeId::new("b"), NodeId::new("ghost"), NodeId::new("a")];
        let nodes = backend.get_nodes(&ids).unwrap();

        let loaded: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(loaded, vec!["b", "a"]);
    }

    #[test]
    fn test_store_edge_assigns_ids_and_allows_parallel_edges() {
        let backend = SqliteGraphBackend::in_memory().unwrap();

        let first = backend.store_edge(&edge("a", "b", EdgeType::SimilarTo)).unwrap();
        let second = backend
            .store_edge(&edge("a", "b", EdgeType::SimilarTo).with_weight(0.0))
            .unwrap();
        assert!(second > first);

        let edges = backend.get_edges(&NodeId::new("a"), None).unwrap();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].id, Some(first));
        assert!(edges[1].weight.abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_edges_filters_by_type_and_direction() {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        backend.store_edge(&edge("t1", "f1", EdgeType::Modifies)).unwrap();
        backend.store_edge(&edge("t2", "t1", EdgeType::DependsOn)).unwrap();
        backend
            .store_edge(&edge("t1", "agent", EdgeType::SucceededWith))
            .unwrap();

        let t1 = NodeId::new("t1");
        assert_eq!(backend.get_edges(&t1, None).unwrap().len(), 3);

        let filtered = backend
            .get_edges(&t1, Some(&[EdgeType::DependsOn, EdgeType::Modifies]))
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|e| e.edge_type != EdgeType::SucceededWith));

        // An empty filter behaves like no filter.
        assert_eq!(backend.get_edges(&t1, Some(&[])).unwrap().len(), 3);
    }

    #[test]
    fn test_neighbors_is_undirected_and_batched() {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        backend.store_edge(&edge("a", "b", EdgeType::SimilarTo)).unwrap();
        backend.store_edge(&edge("c", "a", EdgeType::DependsOn)).unwrap();
        backend.store_edge(&edge("d", "e", EdgeType::Modifies)).unwrap();

        let frontier = [NodeId::new("a"), NodeId::new("e")];
        let adjacency = backend.neighbors(&frontier, None).unwrap();

        assert_eq!(
            adjacency.get(&NodeId::new("a")).unwrap(),
            &vec![NodeId::new("b"), NodeId::new("c")]
        );
        assert_eq!(adjacency.get(&NodeId::new("e")).unwrap(), &vec![NodeId::new("d")]);

        let typed = backend
            .neighbors(&frontier, Some(&[EdgeType::DependsOn]))
            .unwrap();
        assert_eq!(typed.get(&NodeId::new("a")).unwrap(), &vec![NodeId::new("c")]);
        assert!(!typed.contains_key(&NodeId::new("e")));
    }

    #[test]
    fn test_delete_node_cascades_edges() {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        backend.store_node(&task("a")).unwrap();
        backend.store_node(&task("b")).unwrap();
        backend.store_edge(&edge("a", "b", EdgeType::DependsOn)).unwrap();
        backend.store_edge(&edge("b", "a", EdgeType::SimilarTo)).unwrap();

        assert!(backend.delete_node(&NodeId::new("a")).unwrap());
        assert!(backend.get_edges(&NodeId::new("b"), None).unwrap().is_empty());

        // Second delete is a no-op.
        assert!(!backend.delete_node(&NodeId::new("a")).unwrap());
    }

    #[test]
    fn test_get_stats_and_clear() {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        backend.store_node(&task("t1")).unwrap();
        backend
            .store_node(
                &KnowledgeNode::new(NodeType::Agent)
                    .with_id("agent:x")
                    .with_created_at(1),
            )
            .unwrap();
        backend
            .store_edge(&edge("t1", "agent:x", EdgeType::SucceededWith))
            .unwrap();

        let stats = backend.get_stats().unwrap();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 1);
        assert_eq!(stats.nodes_by_type.get(&NodeType::Agent), Some(&1));
        assert_eq!(stats.edges_by_type.get(&EdgeType::SucceededWith), Some(&1));

        backend.clear().unwrap();
        let stats = backend.get_stats().unwrap();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.edge_count, 0);
    }

    #[test]
    fn test_corrupt_json_fails_the_read() {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        backend.store_node(&task("t1")).unwrap();
        backend.store_edge(&edge("t1", "f1", EdgeType::Modifies)).unwrap();
        {
            let conn = acquire_lock(&backend.conn);
            conn.execute_batch(
                "UPDATE graph_nodes SET properties = '{broken'; UPDATE graph_edges SET metadata = 'nope';",
            )
            .unwrap();
        }

        assert!(matches!(
            backend.get_node(&NodeId::new("t1")),
            Err(Error::OperationFailed { .. })
        ));
        assert!(backend.get_edges(&NodeId::new("t1"), None).is_err());
    }

    #[test]
    fn test_file_backed_persists_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("graph.db");

        {
            let backend = SqliteGraphBackend::new(&path).unwrap();
            backend.store_node(&task("t1")).unwrap();
            backend.store_edge(&edge("t1", "f1", EdgeType::Modifies)).unwrap();
            assert_eq!(backend.db_path(), Some(path.as_path()));
        }

        let reopened = SqliteGraphBackend::new(&path).unwrap();
        assert!(reopened.get_node(&NodeId::new("t1")).unwrap().is_some());
        assert_eq!(reopened.get_edges(&NodeId::new("f1"), None).unwrap().len(), 1);
    }
}
