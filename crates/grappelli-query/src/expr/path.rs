//! Entity aliases and path expressions.

use std::fmt;
use std::sync::Arc;

use grappelli_core::{Error, Result, SemanticType, SqlType};

use super::{Aggregate, AggregateFunc, Expr, TypedExpr};
use crate::metadata::{AssociationMetadata, EntityMetadata, MetadataRegistry};

/// An aliased entity: the root of path expressions, a query source, a join
/// target and an entity projection.
#[derive(Clone)]
pub struct EntityPath {
	alias: String,
	metadata: Arc<EntityMetadata>,
	registry: Arc<MetadataRegistry>,
}

impl EntityPath {
	pub(crate) fn new(alias: &str, metadata: Arc<EntityMetadata>, registry: Arc<MetadataRegistry>) -> Self {
		Self {
			alias: alias.to_string(),
			metadata,
			registry,
		}
	}

	pub fn alias(&self) -> &str {
		&self.alias
	}

	pub fn metadata(&self) -> &Arc<EntityMetadata> {
		&self.metadata
	}

	pub fn entity_name(&self) -> &str {
		self.metadata.name()
	}

	pub fn registry(&self) -> &Arc<MetadataRegistry> {
		&self.registry
	}

	/// Same entity under another alias (for subqueries over the same table).
	pub fn aliased(&self, alias: &str) -> Self {
		Self::new(alias, Arc::clone(&self.metadata), Arc::clone(&self.registry))
	}

	/// Untyped path to a scalar field.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownField`] when the entity has no such field.
	pub fn field(&self, name: &str) -> Result<Expr> {
		let field = self.metadata.field(name)?;
		Ok(Expr::Path(PathExpr {
			root: self.alias.clone(),
			root_entity: self.metadata.name().to_string(),
			hops: Vec::new(),
			field: field.name().to_string(),
			column: field.column().to_string(),
			semantic_type: field.semantic_type(),
		}))
	}

	/// Typed path to a scalar field. `T` must match the declared type.
	pub fn column<T: SqlType>(&self, name: &str) -> Result<TypedExpr<T>> {
		TypedExpr::declared(self.field(name)?)
	}

	/// Path to the primary key.
	pub fn id(&self) -> Expr {
		let key = self.metadata.primary_key();
		Expr::Path(PathExpr {
			root: self.alias.clone(),
			root_entity: self.metadata.name().to_string(),
			hops: Vec::new(),
			field: key.name().to_string(),
			column: key.column().to_string(),
			semantic_type: key.semantic_type(),
		})
	}

	/// Navigate an association.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownAssociation`] when the entity has no such
	/// association.
	pub fn association(&self, name: &str) -> Result<AssociationPath> {
		let association = self.metadata.association(name)?.clone();
		let target = self.registry.describe(association.target())?;
		Ok(AssociationPath {
			owner: self.clone(),
			hops: vec![association],
			target,
		})
	}

	/// Resolve a dotted path such as `team.name`: every segment but the last
	/// is an association, the last one a field.
	pub fn path(&self, dotted: &str) -> Result<Expr> {
		let mut segments: Vec<&str> = dotted.split('.').collect();
		let field = segments.pop().unwrap_or_default();
		let Some((first, rest)) = segments.split_first() else {
			return self.field(field);
		};
		let mut association = self.association(first)?;
		for segment in rest {
			association = association.navigate(segment)?;
		}
		association.field(field)
	}

	/// Raw foreign-key column of an owning association.
	pub fn foreign_key(&self, association: &str) -> Result<Expr> {
		let metadata = self.metadata.association(association)?;
		if !metadata.is_owning() {
			return Err(Error::InvalidArgument(format!(
				"{}.{} is not the owning side and has no foreign key",
				self.metadata.name(),
				association
			)));
		}
		let target = self.registry.describe(metadata.target())?;
		self.association(association)?
			.field(target.primary_key().name())
	}

	/// `count(alias)`: number of non-null primary keys.
	pub fn count(&self) -> TypedExpr<i64> {
		TypedExpr::from_expr(Expr::Aggregate(Aggregate::new(
			AggregateFunc::Count,
			self.id(),
			false,
		)))
	}
}

impl PartialEq for EntityPath {
	fn eq(&self, other: &Self) -> bool {
		self.alias == other.alias && self.metadata.name() == other.metadata.name()
	}
}

impl fmt::Debug for EntityPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "EntityPath({} as {})", self.metadata.name(), self.alias)
	}
}

impl From<&EntityPath> for EntityPath {
	fn from(path: &EntityPath) -> Self {
		path.clone()
	}
}

/// A path to a scalar column, possibly reached through associations.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
	root: String,
	root_entity: String,
	hops: Vec<AssociationMetadata>,
	field: String,
	column: String,
	semantic_type: SemanticType,
}

impl PathExpr {
	/// Alias the path starts from.
	pub fn root(&self) -> &str {
		&self.root
	}

	pub fn root_entity(&self) -> &str {
		&self.root_entity
	}

	/// Associations traversed between the root and the column's table.
	pub fn hops(&self) -> &[AssociationMetadata] {
		&self.hops
	}

	pub fn field(&self) -> &str {
		&self.field
	}

	pub fn column(&self) -> &str {
		&self.column
	}

	pub fn semantic_type(&self) -> SemanticType {
		self.semantic_type
	}
}

impl fmt::Display for PathExpr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.root)?;
		for hop in &self.hops {
			write!(f, ".{}", hop.name())?;
		}
		write!(f, ".{}", self.field)
	}
}

/// An association reached from an alias, usable as a join path or to build
/// paths into the associated entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationPath {
	owner: EntityPath,
	hops: Vec<AssociationMetadata>,
	target: Arc<EntityMetadata>,
}

impl AssociationPath {
	/// Alias the association is navigated from.
	pub fn owner(&self) -> &EntityPath {
		&self.owner
	}

	pub fn hops(&self) -> &[AssociationMetadata] {
		&self.hops
	}

	/// The last association of the path.
	pub fn association(&self) -> &AssociationMetadata {
		&self.hops[self.hops.len() - 1]
	}

	pub fn target(&self) -> &Arc<EntityMetadata> {
		&self.target
	}

	/// Continue navigating from the associated entity.
	pub fn navigate(&self, name: &str) -> Result<AssociationPath> {
		let next = self.target.association(name)?.clone();
		let target = self.owner.registry().describe(next.target())?;
		let mut hops = self.hops.clone();
		hops.push(next);
		Ok(AssociationPath {
			owner: self.owner.clone(),
			hops,
			target,
		})
	}

	/// Untyped path to a field of the associated entity.
	///
	/// The primary key reached through an owning association resolves to the
	/// foreign-key column of the previous table, so no join is needed for it.
	pub fn field(&self, name: &str) -> Result<Expr> {
		let field = self.target.field(name)?;
		let last = self.association();
		let (hops, field_name, column) =
			if last.is_owning() && field.name() == self.target.primary_key().name() {
				(
					self.hops[..self.hops.len() - 1].to_vec(),
					format!("{}.{}", last.name(), field.name()),
					last.owner_column().to_string(),
				)
			} else {
				(
					self.hops.clone(),
					field.name().to_string(),
					field.column().to_string(),
				)
			};
		Ok(Expr::Path(PathExpr {
			root: self.owner.alias().to_string(),
			root_entity: self.owner.entity_name().to_string(),
			hops,
			field: field_name,
			column,
			semantic_type: field.semantic_type(),
		}))
	}

	/// Typed path to a field of the associated entity.
	pub fn column<T: SqlType>(&self, name: &str) -> Result<TypedExpr<T>> {
		TypedExpr::declared(self.field(name)?)
	}
}
