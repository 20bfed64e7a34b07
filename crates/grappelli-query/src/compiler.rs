//! SQL compiler
//!
//! Renders a [`QueryPlan`](crate::plan::QueryPlan) into parameterized SQL for
//! a [`Dialect`], together with the [`ResultLayout`] the execution layer
//! needs to map rows back to scalars, entities and tuples.
//!
//! Every check that can reject a plan runs before any SQL is returned, so an
//! invalid plan never reaches a connection.

mod dialect;
mod dml;
mod select;
mod sql_writer;

use std::sync::Arc;

use grappelli_core::{SemanticType, Value};

pub use dialect::{AnsiDialect, Dialect, DialectKind, MySqlDialect, PostgresDialect, SqliteDialect};
pub use dml::{compile_insert, compile_update};
pub use select::SelectCompiler;
pub use sql_writer::SqlWriter;

use crate::expr::Projection;
use crate::metadata::{AssociationMetadata, EntityMetadata};

/// SQL text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
	sql: String,
	params: Vec<Value>,
}

impl CompiledStatement {
	pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
		Self {
			sql: sql.into(),
			params,
		}
	}

	pub fn sql(&self) -> &str {
		&self.sql
	}

	pub fn params(&self) -> &[Value] {
		&self.params
	}

	pub fn into_parts(self) -> (String, Vec<Value>) {
		(self.sql, self.params)
	}
}

/// A compiled `SELECT` and the layout of its rows.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
	statement: CompiledStatement,
	layout: ResultLayout,
}

impl CompiledQuery {
	pub fn sql(&self) -> &str {
		self.statement.sql()
	}

	pub fn params(&self) -> &[Value] {
		self.statement.params()
	}

	pub fn statement(&self) -> &CompiledStatement {
		&self.statement
	}

	pub fn layout(&self) -> &ResultLayout {
		&self.layout
	}
}

/// How a row is turned into one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
	/// One scalar projection.
	Scalar,
	/// One entity projection.
	Entity,
	/// Several projections.
	Tuple,
}

#[derive(Debug, Clone)]
pub enum ItemKind {
	/// One column; `None` when the type is unknown (a bare `NULL`).
	Scalar(Option<SemanticType>),
	/// [`EntityMetadata::selected_columns`] of the entity.
	Entity(Arc<EntityMetadata>),
}

/// A projection and the columns it occupies.
#[derive(Debug, Clone)]
pub struct LayoutItem {
	projection: Projection,
	offset: usize,
	kind: ItemKind,
}

impl LayoutItem {
	pub fn projection(&self) -> &Projection {
		&self.projection
	}

	/// Index of the first column.
	pub fn offset(&self) -> usize {
		self.offset
	}

	pub fn kind(&self) -> &ItemKind {
		&self.kind
	}

	pub fn width(&self) -> usize {
		match &self.kind {
			ItemKind::Scalar(_) => 1,
			ItemKind::Entity(metadata) => metadata.column_count(),
		}
	}
}

/// Hidden columns of a fetch join, attached to the owner alias's instances.
#[derive(Debug, Clone)]
pub struct FetchBinding {
	owner_alias: String,
	association: AssociationMetadata,
	target_alias: String,
	target: Arc<EntityMetadata>,
	offset: usize,
}

impl FetchBinding {
	pub fn owner_alias(&self) -> &str {
		&self.owner_alias
	}

	pub fn association(&self) -> &AssociationMetadata {
		&self.association
	}

	pub fn target_alias(&self) -> &str {
		&self.target_alias
	}

	pub fn target(&self) -> &Arc<EntityMetadata> {
		&self.target
	}

	pub fn offset(&self) -> usize {
		self.offset
	}
}

/// Column layout of the rows produced by a [`CompiledQuery`].
#[derive(Debug, Clone)]
pub struct ResultLayout {
	shape: ResultShape,
	items: Vec<LayoutItem>,
	fetches: Vec<FetchBinding>,
	width: usize,
}

impl ResultLayout {
	pub fn shape(&self) -> ResultShape {
		self.shape
	}

	pub fn items(&self) -> &[LayoutItem] {
		&self.items
	}

	pub fn fetches(&self) -> &[FetchBinding] {
		&self.fetches
	}

	/// Total number of columns per row, hidden fetch columns included.
	pub fn width(&self) -> usize {
		self.width
	}
}
