//! `nodes` crate: the action catalog and the executor that applies it.
//!
//! Action nodes in a workflow carry an [`ActionConfig`]; the engine crate
//! hands each one to [`ActionExecutor::apply`] together with the run's
//! [`ExecutionContext`].

pub mod error;
pub mod context;
pub mod action;
pub mod executor;

pub use error::NodeError;
pub use context::ExecutionContext;
pub use action::{ActionConfig, TaskAssignment, WaitUnit};
pub use executor::{ActionExecutor, ActionOutcome};
