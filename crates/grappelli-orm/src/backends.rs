//! Concrete store adapters.

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, SqliteTransactionExecutor};
