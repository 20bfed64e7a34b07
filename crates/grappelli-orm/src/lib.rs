//! # Grappelli ORM
//!
//! Executes [`QueryPlan`](grappelli_query::QueryPlan)s inside a unit of work
//! and materializes their rows as shared entity instances.
//!
//! - [`connection`]: backend traits and the [`DatabaseConnection`] handle
//! - [`session`]: the [`Session`], its identity map and lazy loading
//! - [`query`]: the [`Fetch`] terminal operations on plans
//! - [`settings`]: [`OrmSettings`] from TOML and `GRAPPELLI_*` variables
//!
//! ## Example
//!
//! ```rust,ignore
//! use grappelli_orm::prelude::*;
//!
//! let connection = DatabaseConnection::connect(&OrmSettings::from_file("grappelli.toml")?).await?;
//! let mut session = Session::begin(&connection, registry.clone()).await?;
//!
//! let member = registry.entity("Member", "member")?;
//! let total = select_from(&member).fetch_count(&mut session).await?;
//! session.commit().await?;
//! ```

pub mod backends;
pub mod connection;
pub mod entity;
mod hydrate;
pub mod identity;
pub mod query;
pub mod record;
pub mod session;
pub mod settings;
pub mod transaction;

#[cfg(test)]
mod test_support;

pub use connection::{
	Connection, DatabaseBackend, DatabaseConnection, DatabaseError, RowSet, TransactionExecutor,
	TransactionManager,
};
pub use entity::{AssociationState, Entity, EntityRef};
pub use identity::{EntityKey, IdentityMap};
pub use query::Fetch;
pub use record::{FromRecord, QueryResults, Record, Tuple, TupleKey};
pub use session::Session;
pub use settings::OrmSettings;
pub use transaction::{TransactionState, UnitOfWork};

/// Re-exports for running queries.
pub mod prelude {
	pub use crate::connection::DatabaseConnection;
	pub use crate::entity::{AssociationState, EntityRef};
	pub use crate::query::Fetch;
	pub use crate::record::{QueryResults, Record, Tuple};
	pub use crate::session::Session;
	pub use crate::settings::OrmSettings;
	pub use grappelli_query::prelude::*;
}
