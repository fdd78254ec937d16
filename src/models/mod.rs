//! Data models for agentlore.
//!
//! This module contains all the core data structures used throughout the system.

mod context;
mod execution;
mod failure;
pub mod graph;
mod progress;

pub use context::{Degradation, DegradationSource, WarmUpContext};
pub use execution::{
    AgentSuccessCount, FileOperation, OperationRates, QcVerdict, SuccessfulPattern,
    TaskDescriptor, TaskExecution, ToolExecution,
};
pub use failure::{AgentSelection, FailureAnalysis, FailureCategory};
pub use graph::{EdgeType, KnowledgeEdge, KnowledgeNode, NodeId, NodeType, Properties, PropertyValue};
pub use progress::{EventFilter, ProgressEvent, ProgressEventType};
