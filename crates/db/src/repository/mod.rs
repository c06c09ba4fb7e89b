//! Repository functions: one function per database operation.
//!
//! Every function takes a `&PgPool` and returns a `Result<T, DbError>`.
//! No business logic: SQL plus the mapping back onto `crate::models`.

pub mod automations;
pub mod records;
pub mod effects;
pub mod executions;

use std::str::FromStr;

use crate::DbError;

/// Parse a TEXT column back into one of the model vocabularies.
pub(crate) fn decode<T: FromStr<Err = String>>(value: &str) -> Result<T, DbError> {
    value.parse().map_err(DbError::Decode)
}
