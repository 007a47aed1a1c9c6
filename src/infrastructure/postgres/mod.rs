//! PostgreSQL persistence module.
//!
//! Provides connection pooling for the PostgreSQL template repository.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
