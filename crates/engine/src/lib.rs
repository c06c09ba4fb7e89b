//! `engine` crate: workflow graph model, validation, trigger matching and
//! the execution engine.

pub mod models;
pub mod error;
pub mod dag;
pub mod condition;
pub mod locks;
pub mod executor;
pub mod trigger;
pub mod dispatch;

pub use models::{replace_workflow, Condition, NodeKind, WorkflowEdge, WorkflowGraph, WorkflowNode};
pub use error::EngineError;
pub use dag::validate_workflow;
pub use executor::{ExecutorConfig, RunOutcome, WorkflowExecutor};
pub use trigger::TriggerMatcher;
pub use dispatch::{AutomationEngine, TriggerEvent};
