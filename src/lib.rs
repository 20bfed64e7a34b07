//! # Grappelli
//!
//! Type-checked query construction, compilation and execution over a
//! relational store, built around a small entity graph description.
//!
//! ## Crates
//!
//! - [`core`]: the [`Value`] model and the [`Error`] shared by every layer
//! - [`query`]: metadata registry, typed expressions, query plans and the
//!   SQL compiler
//! - [`orm`]: connections, sessions, identity map and unit of work
//!
//! ## Feature Flags
//!
//! - `sqlite` (default) - SQLite backend through `sqlx`
//!
//! Without a backend feature the query layer still compiles plans for every
//! dialect; only execution is unavailable.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use grappelli::prelude::*;
//!
//! let registry = MetadataRegistry::builder()
//!     .register(
//!         EntityDefinition::new("Team", "team")
//!             .id("id", SemanticType::Integer)
//!             .field("name", SemanticType::Text)
//!             .one_to_many("members", "Member", "team"),
//!     )
//!     .register(
//!         EntityDefinition::new("Member", "member")
//!             .id("id", SemanticType::Integer)
//!             .field("user_name", SemanticType::Text)
//!             .field("age", SemanticType::Integer)
//!             .many_to_one("team", "Team", "team_id"),
//!     )
//!     .build()?;
//!
//! let member = registry.entity("Member", "member")?;
//! let team = registry.entity("Team", "team")?;
//! let age = member.column::<i32>("age")?;
//!
//! let connection = DatabaseConnection::connect(&OrmSettings::default()).await?;
//! let mut session = Session::begin(&connection, registry.clone()).await?;
//!
//! let seniors: Vec<EntityRef> = select_from(&member)
//!     .inner_join(&member.association("team")?, &team)
//!     .fetch_join()?
//!     .filter(age.goe(30))
//!     .order_by(age.desc())
//!     .fetch(&mut session)
//!     .await?;
//! session.commit().await?;
//! ```

pub use grappelli_core as core;
pub use grappelli_orm as orm;
pub use grappelli_query as query;

pub use grappelli_core::{Error, Result, SemanticType, SqlType, Value};
pub use grappelli_orm::{
	AssociationState, DatabaseConnection, Entity, EntityRef, Fetch, OrmSettings, QueryResults,
	Record, Session, Tuple,
};
pub use grappelli_query::{
	CompiledQuery, Dialect, DialectKind, EntityDefinition, EntityPath, MetadataRegistry, QueryPlan,
	SelectCompiler, select, select_from,
};

/// Everything needed to describe entities, build plans and run them.
pub mod prelude {
	pub use grappelli_orm::prelude::*;
}
