//! # Grappelli Query
//!
//! Typed query construction and SQL compilation over a registry of entity
//! metadata.
//!
//! - [`metadata`]: entity definitions and the immutable [`MetadataRegistry`]
//! - [`expr`]: path expressions, predicates, aggregates and ordering
//! - [`plan`]: the [`QueryPlan`] builder
//! - [`compiler`]: dialect-aware rendering into parameterized SQL
//!
//! ## Example
//!
//! ```rust,ignore
//! use grappelli_query::prelude::*;
//!
//! let member = registry.entity("Member", "member")?;
//! let age = member.column::<i32>("age")?;
//!
//! let plan = select_from(&member)
//!     .filter(age.between(20, 30))
//!     .order_by(age.desc())
//!     .limit(10)?;
//!
//! let compiled = SelectCompiler::for_kind(DialectKind::Sqlite).compile(&plan)?;
//! ```

pub mod compiler;
pub mod expr;
pub mod metadata;
pub mod plan;

#[cfg(test)]
mod test_fixtures;

pub use compiler::{CompiledQuery, CompiledStatement, Dialect, DialectKind, SelectCompiler};
pub use expr::{EntityPath, Expr, OrderSpecifier, Predicate, Projection, TypedExpr};
pub use metadata::{EntityDefinition, EntityMetadata, MetadataRegistry};
pub use plan::{JoinKind, QueryPlan, select, select_from};

/// Re-exports for building queries.
pub mod prelude {
	pub use crate::compiler::{DialectKind, SelectCompiler};
	pub use crate::expr::{
		AssociationPath, EntityPath, Expr, InOperand, Operand, OrderSpecifier, Predicate, TypedExpr,
	};
	pub use crate::metadata::{EntityDefinition, MetadataRegistry};
	pub use crate::plan::{JoinKind, QueryPlan, select, select_from};
	pub use grappelli_core::{Error, Result, SemanticType, Value};
}
