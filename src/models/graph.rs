// Allow non-const functions that use f64 comparisons (not const-stable yet)
#![allow(clippy::missing_const_for_fn)]

//! Knowledge graph types for task, file, agent, and pattern relationships.
//!
//! # Node Types
//!
//! | Type | Description | Example id |
//! |------|-------------|------------|
//! | `Task` | A plan task, identified by plan file and number | `task:plan.md#3` |
//! | `File` | A file touched by an execution | `file:src/main.rs` |
//! | `Agent` | An agent that ran a task | `agent:rust-pro` |
//! | `Pattern` | A recurring success or failure signature | `pattern:compilation_error` |
//!
//! # Edge Types
//!
//! - `Modifies` - Task → File
//! - `SucceededWith` - Task → Agent
//! - `SimilarTo` - Task → Task
//! - `CausedFailure` - Task/Pattern → Agent
//! - `DependsOn` - Task → Task
//! - `UsedBy` - Pattern → Agent
//!
//! Edges are directed when stored but traversals treat them as undirected.
//!
//! # Example
//!
//! ```rust
//! use agentlore::models::graph::{EdgeType, KnowledgeEdge, KnowledgeNode, NodeId, NodeType};
//!
//! let task = KnowledgeNode::new(NodeType::Task)
//!     .with_id(NodeId::new("task:plan.md#1"))
//!     .with_property("name", "Add login handler");
//!
//! let edge = KnowledgeEdge::new(
//!     task.id.clone(),
//!     NodeId::new("agent:rust-pro"),
//!     EdgeType::SucceededWith,
//! );
//! assert!((edge.weight - 1.0).abs() < f64::EPSILON);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a graph node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new random node ID (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the node ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is empty (caller left it unset).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Node ID of a plan task.
    #[must_use]
    pub fn for_task(plan_file: &str, task_number: &str) -> Self {
        Self(format!("task:{plan_file}#{task_number}"))
    }

    /// Node ID of an agent.
    #[must_use]
    pub fn for_agent(agent: &str) -> Self {
        Self(format!("agent:{agent}"))
    }

    /// Node ID of a file path (expects an already normalized path).
    #[must_use]
    pub fn for_file(path: &str) -> Self {
        Self(format!("file:{path}"))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Type of node in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A plan task.
    Task,
    /// A file in the workspace.
    File,
    /// An agent that executes tasks.
    Agent,
    /// A recurring pattern.
    Pattern,
}

impl NodeType {
    /// Returns all node type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Task, Self::File, Self::Agent, Self::Pattern]
    }

    /// Returns the node type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::File => "file",
            Self::Agent => "agent",
            Self::Pattern => "pattern",
        }
    }

    /// Parses a node type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "task" => Some(Self::Task),
            "file" => Some(Self::File),
            "agent" => Some(Self::Agent),
            "pattern" => Some(Self::Pattern),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown node type: {s}"))
    }
}

/// Type of edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Task modified a file.
    Modifies,
    /// Task succeeded with an agent.
    SucceededWith,
    /// Two tasks are similar.
    SimilarTo,
    /// Something caused a failure for an agent.
    CausedFailure,
    /// Task depends on another task.
    DependsOn,
    /// Pattern used by an agent.
    UsedBy,
}

impl EdgeType {
    /// Returns all edge type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Modifies,
            Self::SucceededWith,
            Self::SimilarTo,
            Self::CausedFailure,
            Self::DependsOn,
            Self::UsedBy,
        ]
    }

    /// Returns the edge type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Modifies => "modifies",
            Self::SucceededWith => "succeeded_with",
            Self::SimilarTo => "similar_to",
            Self::CausedFailure => "caused_failure",
            Self::DependsOn => "depends_on",
            Self::UsedBy => "used_by",
        }
    }

    /// Parses an edge type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "modifies" => Some(Self::Modifies),
            "succeeded_with" => Some(Self::SucceededWith),
            "similar_to" => Some(Self::SimilarTo),
            "caused_failure" => Some(Self::CausedFailure),
            "depends_on" => Some(Self::DependsOn),
            "used_by" => Some(Self::UsedBy),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown edge type: {s}"))
    }
}

/// Scalar value stored in a node property or edge metadata bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Free text.
    Text(String),
}

impl PropertyValue {
    /// Returns the text value, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value, if this is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a bool.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for PropertyValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Key/value bag attached to nodes and edges.
///
/// A `BTreeMap` keeps serialization order stable.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    /// Node identifier; an empty ID is replaced with a generated one on insert.
    pub id: NodeId,
    /// Node type.
    pub node_type: NodeType,
    /// Property bag.
    pub properties: Properties,
    /// Creation time (Unix seconds); 0 means "set on insert".
    pub created_at: i64,
}

impl KnowledgeNode {
    /// Creates a node with an empty ID and no properties.
    #[must_use]
    pub fn new(node_type: NodeType) -> Self {
        Self {
            id: NodeId::default(),
            node_type,
            properties: Properties::new(),
            created_at: 0,
        }
    }

    /// Sets the node ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = id.into();
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Returns a text property.
    #[must_use]
    pub fn text_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_text)
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    /// Surrogate ID assigned by the backend on insert.
    pub id: Option<i64>,
    /// Source node ID.
    pub source_id: NodeId,
    /// Target node ID.
    pub target_id: NodeId,
    /// Edge type.
    pub edge_type: EdgeType,
    /// Edge weight. Defaults to 1.0; an explicit 0.0 is kept as-is.
    pub weight: f64,
    /// Metadata bag.
    pub metadata: Properties,
    /// Creation time (Unix seconds); 0 means "set on insert".
    pub created_at: i64,
}

impl KnowledgeEdge {
    /// Default edge weight.
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    /// Creates an edge with the default weight.
    #[must_use]
    pub fn new(source_id: NodeId, target_id: NodeId, edge_type: EdgeType) -> Self {
        Self {
            id: None,
            source_id,
            target_id,
            edge_type,
            weight: Self::DEFAULT_WEIGHT,
            metadata: Properties::new(),
            created_at: 0,
        }
    }

    /// Sets an explicit weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns true if `node` is the source or target of this edge.
    #[must_use]
    pub fn touches(&self, node: &NodeId) -> bool {
        self.source_id == *node || self.target_id == *node
    }

    /// Returns the endpoint opposite to `node`, treating the edge as undirected.
    #[must_use]
    pub fn other_end(&self, node: &NodeId) -> Option<&NodeId> {
        if self.source_id == *node {
            Some(&self.target_id)
        } else if self.target_id == *node {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_roundtrip() {
        for node_type in NodeType::all() {
            assert_eq!(NodeType::parse(node_type.as_str()), Some(*node_type));
        }
        assert_eq!(NodeType::parse("TASK"), Some(NodeType::Task));
        assert_eq!(NodeType::parse("memory"), None);
    }

    #[test]
    fn test_edge_type_roundtrip() {
        for edge_type in EdgeType::all() {
            assert_eq!(EdgeType::parse(edge_type.as_str()), Some(*edge_type));
        }
        assert_eq!(EdgeType::parse("succeeded-with"), Some(EdgeType::SucceededWith));
        assert!("relates_to".parse::<EdgeType>().is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_well_known_ids() {
        assert_eq!(NodeId::for_task("plan.md", "3").as_str(), "task:plan.md#3");
        assert_eq!(NodeId::for_agent("rust-pro").as_str(), "agent:rust-pro");
        assert_eq!(NodeId::for_file("src/lib.rs").as_str(), "file:src/lib.rs");
    }

    #[test]
    fn test_properties_serialize_in_key_order() {
        let node = KnowledgeNode::new(NodeType::Task)
            .with_property("zeta", 1.5)
            .with_property("alpha", "first")
            .with_property("mid", true);

        let json = serde_json::to_string(&node.properties).unwrap();
        assert_eq!(json, r#"{"alpha":"first","mid":true,"zeta":1.5}"#);

        let parsed: Properties = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, node.properties);
    }

    #[test]
    fn test_edge_explicit_zero_weight_is_kept() {
        let edge = KnowledgeEdge::new(NodeId::new("a"), NodeId::new("b"), EdgeType::SimilarTo)
            .with_weight(0.0);
        assert!(edge.weight.abs() < f64::EPSILON);
    }

    #[test]
    fn test_edge_other_end() {
        let a = NodeId::new("a");
        let b = NodeId::new("b");
        let edge = KnowledgeEdge::new(a.clone(), b.clone(), EdgeType::DependsOn);

        assert_eq!(edge.other_end(&a), Some(&b));
        assert_eq!(edge.other_end(&b), Some(&a));
        assert_eq!(edge.other_end(&NodeId::new("c")), None);
        assert!(edge.touches(&a));
    }
}
