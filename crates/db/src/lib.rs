//! `db` crate: persistence layer and store capabilities.
//!
//! Provides the records the automation engine reads and writes, the
//! capability traits it consumes, a Postgres implementation backed by a
//! connection pool, and an in-memory implementation. No business logic
//! lives here.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;
pub mod store;
pub mod pg;
pub mod memory;

pub use pool::DbPool;
pub use error::DbError;
pub use store::Store;
pub use pg::PgStore;
pub use memory::MemoryStore;
