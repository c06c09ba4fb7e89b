//! Node-level error type.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by [`crate::ActionExecutor::apply`].
///
/// Any of these aborts the rest of the run; mutations already applied by
/// earlier actions stay in place.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The record the run targets no longer exists.
    #[error("record {0} not found")]
    RecordNotFound(Uuid),

    /// A store mutation failed.
    #[error("store error: {0}")]
    Store(#[from] db::DbError),
}
