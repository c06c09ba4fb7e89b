//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// A workflow must have exactly one trigger node.
    #[error("workflow must have exactly one trigger node, found {0}")]
    TriggerCount(usize),

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    /// The stored workflow payload doesn't match the graph schema.
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    // ------ Execution errors ------

    /// The graph has no single trigger node to start from.
    #[error("No trigger node found")]
    NoTrigger,

    /// An action node failed; the rest of the run is abandoned.
    #[error("action '{label}' failed: {source}")]
    ActionFailed {
        label: String,
        #[source]
        source: nodes::NodeError,
    },

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
