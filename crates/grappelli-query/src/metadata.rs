//! Entity metadata registry
//!
//! Entities are described once through [`EntityDefinition`]s, validated as a
//! whole graph by [`MetadataRegistryBuilder::build`] and frozen into an
//! immutable [`MetadataRegistry`]. The registry is shared through `Arc` and is
//! the root of every path expression.
//!
//! # Examples
//!
//! ```rust,ignore
//! use grappelli_query::metadata::{EntityDefinition, MetadataRegistry};
//! use grappelli_core::SemanticType;
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
//! ```

use std::sync::Arc;

use grappelli_core::{Error, Result, SemanticType};
use indexmap::IndexMap;
use tracing::debug;

use crate::expr::EntityPath;

/// Whether an association points at one or many target instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
	One,
	Many,
}

/// A scalar field of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMetadata {
	name: String,
	column: String,
	semantic_type: SemanticType,
}

impl FieldMetadata {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn column(&self) -> &str {
		&self.column
	}

	pub fn semantic_type(&self) -> SemanticType {
		self.semantic_type
	}
}

/// A resolved association between two entities.
///
/// The join condition between an owner row and a target row is always
/// `owner.owner_column = target.target_column`:
///
/// - owning side (`many_to_one`, `one_to_one`): `owner_column` is the foreign
///   key stored on the owner table, `target_column` the target's primary key;
/// - inverse side (`one_to_many`): `owner_column` is the owner's primary key,
///   `target_column` the foreign key of the `mapped_by` association.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationMetadata {
	name: String,
	owner: String,
	target: String,
	target_table: String,
	cardinality: Cardinality,
	owning: bool,
	owner_column: String,
	target_column: String,
	mapped_by: Option<String>,
	key_type: SemanticType,
}

impl AssociationMetadata {
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Name of the entity declaring the association.
	pub fn owner(&self) -> &str {
		&self.owner
	}

	/// Name of the associated entity.
	pub fn target(&self) -> &str {
		&self.target
	}

	pub fn target_table(&self) -> &str {
		&self.target_table
	}

	pub fn cardinality(&self) -> Cardinality {
		self.cardinality
	}

	/// `true` when the owner table stores the foreign key.
	pub fn is_owning(&self) -> bool {
		self.owning
	}

	pub fn owner_column(&self) -> &str {
		&self.owner_column
	}

	pub fn target_column(&self) -> &str {
		&self.target_column
	}

	pub fn mapped_by(&self) -> Option<&str> {
		self.mapped_by.as_deref()
	}

	/// Semantic type of the values on both sides of the join condition.
	pub fn key_type(&self) -> SemanticType {
		self.key_type
	}
}

/// Immutable description of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetadata {
	name: String,
	table: String,
	primary_key: usize,
	fields: Vec<FieldMetadata>,
	associations: Vec<AssociationMetadata>,
}

impl EntityMetadata {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn primary_key(&self) -> &FieldMetadata {
		&self.fields[self.primary_key]
	}

	/// Position of the primary key among [`fields`](Self::fields).
	pub fn primary_key_index(&self) -> usize {
		self.primary_key
	}

	/// Scalar fields in declaration order, primary key included.
	pub fn fields(&self) -> &[FieldMetadata] {
		&self.fields
	}

	pub fn field(&self, name: &str) -> Result<&FieldMetadata> {
		self.fields
			.iter()
			.find(|f| f.name == name)
			.ok_or_else(|| Error::unknown_field(&self.name, name))
	}

	pub fn field_index(&self, name: &str) -> Result<usize> {
		self.fields
			.iter()
			.position(|f| f.name == name)
			.ok_or_else(|| Error::unknown_field(&self.name, name))
	}

	pub fn associations(&self) -> &[AssociationMetadata] {
		&self.associations
	}

	pub fn association(&self, name: &str) -> Result<&AssociationMetadata> {
		self.associations
			.iter()
			.find(|a| a.name == name)
			.ok_or_else(|| Error::unknown_association(&self.name, name))
	}

	pub fn association_index(&self, name: &str) -> Result<usize> {
		self.associations
			.iter()
			.position(|a| a.name == name)
			.ok_or_else(|| Error::unknown_association(&self.name, name))
	}

	/// Owning associations, whose foreign keys live in this entity's table.
	pub fn foreign_keys(&self) -> impl Iterator<Item = &AssociationMetadata> {
		self.associations.iter().filter(|a| a.owning)
	}

	/// Columns read when the entity is materialized: every scalar field, then
	/// the foreign key of every owning association.
	pub fn selected_columns(&self) -> Vec<&str> {
		self.fields
			.iter()
			.map(|f| f.column.as_str())
			.chain(self.foreign_keys().map(|a| a.owner_column.as_str()))
			.collect()
	}

	pub fn column_count(&self) -> usize {
		self.fields.len() + self.foreign_keys().count()
	}

	/// Offset of an owning association's foreign key within
	/// [`selected_columns`](Self::selected_columns).
	pub fn foreign_key_offset(&self, association: &str) -> Option<usize> {
		self.foreign_keys()
			.position(|a| a.name == association)
			.map(|i| self.fields.len() + i)
	}
}

#[derive(Debug, Clone)]
enum AssociationDefinition {
	Owning {
		name: String,
		target: String,
		join_column: String,
		cardinality: Cardinality,
	},
	Inverse {
		name: String,
		target: String,
		mapped_by: String,
		cardinality: Cardinality,
	},
}

impl AssociationDefinition {
	fn name(&self) -> &str {
		match self {
			Self::Owning { name, .. } | Self::Inverse { name, .. } => name,
		}
	}
}

/// Static definition of an entity, resolved by the registry builder.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
	name: String,
	table: String,
	primary_key: Option<String>,
	fields: Vec<FieldMetadata>,
	associations: Vec<AssociationDefinition>,
}

impl EntityDefinition {
	pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			table: table.into(),
			primary_key: None,
			fields: Vec::new(),
			associations: Vec::new(),
		}
	}

	/// Declare the primary-key field (column named after the field).
	pub fn id(mut self, name: impl Into<String>, semantic_type: SemanticType) -> Self {
		let name = name.into();
		self.primary_key = Some(name.clone());
		self.fields.push(FieldMetadata {
			column: name.clone(),
			name,
			semantic_type,
		});
		self
	}

	/// Declare a scalar field stored in a column of the same name.
	pub fn field(self, name: impl Into<String>, semantic_type: SemanticType) -> Self {
		let name = name.into();
		let column = name.clone();
		self.column(name, column, semantic_type)
	}

	/// Declare a scalar field stored in a differently named column.
	pub fn column(
		mut self,
		name: impl Into<String>,
		column: impl Into<String>,
		semantic_type: SemanticType,
	) -> Self {
		self.fields.push(FieldMetadata {
			name: name.into(),
			column: column.into(),
			semantic_type,
		});
		self
	}

	/// Owning to-one association through a foreign-key column of this table.
	pub fn many_to_one(
		mut self,
		name: impl Into<String>,
		target: impl Into<String>,
		join_column: impl Into<String>,
	) -> Self {
		self.associations.push(AssociationDefinition::Owning {
			name: name.into(),
			target: target.into(),
			join_column: join_column.into(),
			cardinality: Cardinality::One,
		});
		self
	}

	/// Same storage as [`many_to_one`](Self::many_to_one); kept separate for
	/// readability of definitions.
	pub fn one_to_one(
		self,
		name: impl Into<String>,
		target: impl Into<String>,
		join_column: impl Into<String>,
	) -> Self {
		self.many_to_one(name, target, join_column)
	}

	/// Inverse to-many association, mapped by an owning association declared
	/// on the target.
	pub fn one_to_many(
		mut self,
		name: impl Into<String>,
		target: impl Into<String>,
		mapped_by: impl Into<String>,
	) -> Self {
		self.associations.push(AssociationDefinition::Inverse {
			name: name.into(),
			target: target.into(),
			mapped_by: mapped_by.into(),
			cardinality: Cardinality::Many,
		});
		self
	}

	/// Inverse to-one association.
	pub fn one_to_one_mapped_by(
		mut self,
		name: impl Into<String>,
		target: impl Into<String>,
		mapped_by: impl Into<String>,
	) -> Self {
		self.associations.push(AssociationDefinition::Inverse {
			name: name.into(),
			target: target.into(),
			mapped_by: mapped_by.into(),
			cardinality: Cardinality::One,
		});
		self
	}
}

/// Collects definitions and resolves them into a [`MetadataRegistry`].
#[derive(Debug, Default)]
pub struct MetadataRegistryBuilder {
	definitions: Vec<EntityDefinition>,
}

impl MetadataRegistryBuilder {
	pub fn register(mut self, definition: EntityDefinition) -> Self {
		self.definitions.push(definition);
		self
	}

	/// Validate the entity graph and freeze it.
	///
	/// # Errors
	///
	/// - [`Error::InvalidArgument`] for duplicate entities or members and
	///   entities without a primary key
	/// - [`Error::UnknownEntity`] when an association targets an unregistered
	///   entity
	/// - [`Error::UnknownAssociation`] when `mapped_by` does not name an owning
	///   association of the target pointing back at the declaring entity
	pub fn build(self) -> Result<Arc<MetadataRegistry>> {
		let mut by_name: IndexMap<String, EntityDefinition> = IndexMap::new();
		for definition in self.definitions {
			if definition.primary_key.is_none() {
				return Err(Error::InvalidArgument(format!(
					"entity {} declares no primary key",
					definition.name
				)));
			}
			let mut seen = std::collections::HashSet::new();
			let members = definition
				.fields
				.iter()
				.map(|f| f.name.as_str())
				.chain(definition.associations.iter().map(|a| a.name()));
			for member in members {
				if !seen.insert(member) {
					return Err(Error::InvalidArgument(format!(
						"{} declares {} twice",
						definition.name, member
					)));
				}
			}
			if by_name.contains_key(&definition.name) {
				return Err(Error::InvalidArgument(format!(
					"entity {} is registered twice",
					definition.name
				)));
			}
			by_name.insert(definition.name.clone(), definition);
		}

		let mut entities = IndexMap::with_capacity(by_name.len());
		for definition in by_name.values() {
			let metadata = resolve(definition, &by_name)?;
			entities.insert(definition.name.clone(), Arc::new(metadata));
		}
		debug!(entities = entities.len(), "metadata registry built");
		Ok(Arc::new(MetadataRegistry { entities }))
	}
}

fn primary_key_of(definition: &EntityDefinition) -> Result<&FieldMetadata> {
	let name = definition.primary_key.as_deref().unwrap_or_default();
	definition
		.fields
		.iter()
		.find(|f| f.name == name)
		.ok_or_else(|| Error::unknown_field(&definition.name, name))
}

fn resolve(
	definition: &EntityDefinition,
	all: &IndexMap<String, EntityDefinition>,
) -> Result<EntityMetadata> {
	let own_key = primary_key_of(definition)?;
	let mut associations = Vec::with_capacity(definition.associations.len());

	for association in &definition.associations {
		let resolved = match association {
			AssociationDefinition::Owning {
				name,
				target,
				join_column,
				cardinality,
			} => {
				let target_def = all
					.get(target)
					.ok_or_else(|| Error::UnknownEntity(target.clone()))?;
				let target_key = primary_key_of(target_def)?;
				AssociationMetadata {
					name: name.clone(),
					owner: definition.name.clone(),
					target: target.clone(),
					target_table: target_def.table.clone(),
					cardinality: *cardinality,
					owning: true,
					owner_column: join_column.clone(),
					target_column: target_key.column.clone(),
					mapped_by: None,
					key_type: target_key.semantic_type,
				}
			}
			AssociationDefinition::Inverse {
				name,
				target,
				mapped_by,
				cardinality,
			} => {
				let target_def = all
					.get(target)
					.ok_or_else(|| Error::UnknownEntity(target.clone()))?;
				let join_column = target_def
					.associations
					.iter()
					.find_map(|a| match a {
						AssociationDefinition::Owning {
							name,
							target,
							join_column,
							..
						} if name == mapped_by && *target == definition.name => Some(join_column),
						_ => None,
					})
					.ok_or_else(|| Error::unknown_association(target, mapped_by))?;
				AssociationMetadata {
					name: name.clone(),
					owner: definition.name.clone(),
					target: target.clone(),
					target_table: target_def.table.clone(),
					cardinality: *cardinality,
					owning: false,
					owner_column: own_key.column.clone(),
					target_column: join_column.clone(),
					mapped_by: Some(mapped_by.clone()),
					key_type: own_key.semantic_type,
				}
			}
		};
		associations.push(resolved);
	}

	let primary_key = definition
		.fields
		.iter()
		.position(|f| f.name == own_key.name)
		.unwrap_or_default();

	Ok(EntityMetadata {
		name: definition.name.clone(),
		table: definition.table.clone(),
		primary_key,
		fields: definition.fields.clone(),
		associations,
	})
}

/// Read-only registry of entity metadata, keyed by entity name.
#[derive(Debug)]
pub struct MetadataRegistry {
	entities: IndexMap<String, Arc<EntityMetadata>>,
}

impl MetadataRegistry {
	pub fn builder() -> MetadataRegistryBuilder {
		MetadataRegistryBuilder::default()
	}

	/// Look up the metadata of an entity.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownEntity`] when the entity is not registered.
	pub fn describe(&self, entity: &str) -> Result<Arc<EntityMetadata>> {
		self.entities
			.get(entity)
			.cloned()
			.ok_or_else(|| Error::UnknownEntity(entity.to_string()))
	}

	/// Create an alias of an entity, the root of path expressions.
	pub fn entity(self: &Arc<Self>, entity: &str, alias: &str) -> Result<EntityPath> {
		let metadata = self.describe(entity)?;
		if alias.is_empty() {
			return Err(Error::InvalidArgument("entity alias must not be empty".into()));
		}
		Ok(EntityPath::new(alias, metadata, Arc::clone(self)))
	}

	pub fn contains(&self, entity: &str) -> bool {
		self.entities.contains_key(entity)
	}

	pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityMetadata>> {
		self.entities.values()
	}
}
