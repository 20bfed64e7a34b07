//! Row materialization
//!
//! Maps the rows of one execution onto records following the
//! [`ResultLayout`] the compiler produced, going through the identity map
//! for every entity.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use grappelli_core::{Error, Result, Value};
use grappelli_query::compiler::{ItemKind, ResultLayout, ResultShape};
use grappelli_query::metadata::{AssociationMetadata, Cardinality};
use grappelli_query::{EntityMetadata, Projection};
use indexmap::IndexMap;
use tracing::trace;

use crate::entity::{AssociationState, Entity, EntityRef};
use crate::identity::{EntityKey, IdentityMap};
use crate::record::{Record, Tuple};

/// Materializes the rows of a single execution.
///
/// Instances built here are staged and only enter the identity map once
/// every row has been materialized.
pub(crate) struct Hydrator<'a> {
	identity: &'a mut IdentityMap,
	staged: IndexMap<EntityKey, EntityRef>,
	/// `(owner, association)` collections started by this execution; only
	/// those receive fetched items.
	collections: HashSet<(usize, usize)>,
}

impl<'a> Hydrator<'a> {
	pub(crate) fn new(identity: &'a mut IdentityMap) -> Self {
		Self {
			identity,
			staged: IndexMap::new(),
			collections: HashSet::new(),
		}
	}

	pub(crate) fn records(&mut self, layout: &ResultLayout, rows: Vec<Vec<Value>>) -> Result<Vec<Record>> {
		let keys: Arc<[Projection]> = layout.items().iter().map(|i| i.projection().clone()).collect();
		let records = rows
			.iter()
			.map(|row| {
				if row.len() < layout.width() {
					return Err(Error::execution(format!(
						"row has {} columns, the query selects {}",
						row.len(),
						layout.width()
					)));
				}
				let mut items = self.row(layout, row)?;
				match layout.shape() {
					ResultShape::Tuple => Ok(Record::Tuple(Tuple::new(Arc::clone(&keys), items))),
					ResultShape::Scalar | ResultShape::Entity => {
						Ok(items.pop().unwrap_or(Record::Value(Value::Null)))
					}
				}
			})
			.collect::<Result<Vec<_>>>()?;

		for (_, entity) in self.staged.drain(..) {
			self.identity.register(entity)?;
		}
		Ok(records)
	}

	fn row(&mut self, layout: &ResultLayout, row: &[Value]) -> Result<Vec<Record>> {
		let mut instances: HashMap<&str, Option<EntityRef>> = HashMap::new();
		let mut items = Vec::with_capacity(layout.items().len());

		for item in layout.items() {
			let columns = &row[item.offset()..item.offset() + item.width()];
			let record = match item.kind() {
				ItemKind::Scalar(Some(semantic_type)) => Record::Value(semantic_type.coerce(columns[0].clone())?),
				ItemKind::Scalar(None) => Record::Value(columns[0].clone()),
				ItemKind::Entity(metadata) => {
					let entity = self.entity(metadata, columns)?;
					if let Projection::Entity(path) = item.projection() {
						instances.insert(path.alias(), entity.clone());
					}
					Record::Entity(entity)
				}
			};
			items.push(record);
		}

		for binding in layout.fetches() {
			let start = binding.offset();
			let columns = &row[start..start + binding.target().column_count()];
			let target = self.entity(binding.target(), columns)?;
			if let Some(Some(owner)) = instances.get(binding.owner_alias()) {
				self.attach(owner, binding.association(), target.as_ref())?;
			}
			instances.insert(binding.target_alias(), target);
		}

		Ok(items)
	}

	/// Materialize one entity from its selected columns; `None` when the
	/// primary key is `NULL` (the missing side of a left join).
	pub(crate) fn entity(&mut self, metadata: &Arc<EntityMetadata>, columns: &[Value]) -> Result<Option<EntityRef>> {
		let key_field = metadata.primary_key();
		let id = key_field
			.semantic_type()
			.coerce(columns[metadata.primary_key_index()].clone())?;
		if id.is_null() {
			return Ok(None);
		}

		let key = EntityKey::new(metadata.name(), &id)?;
		if let Some(existing) = self.identity.get(&key) {
			trace!(entity = metadata.name(), id = %id, "identity map hit");
			return Ok(Some(Arc::clone(existing)));
		}
		if let Some(staged) = self.staged.get(&key) {
			return Ok(Some(Arc::clone(staged)));
		}

		let values = metadata
			.fields()
			.iter()
			.zip(columns)
			.map(|(field, value)| field.semantic_type().coerce(value.clone()))
			.collect::<Result<Vec<_>>>()?;

		let associations = metadata
			.associations()
			.iter()
			.map(|association| {
				if !association.is_owning() {
					return Ok(AssociationState::Deferred(id.clone()));
				}
				let raw = metadata
					.foreign_key_offset(association.name())
					.and_then(|offset| columns.get(offset))
					.cloned()
					.unwrap_or(Value::Null);
				let foreign_key = association.key_type().coerce(raw)?;
				Ok(if foreign_key.is_null() {
					AssociationState::One(None)
				} else {
					AssociationState::Deferred(foreign_key)
				})
			})
			.collect::<Result<Vec<_>>>()?;

		let entity = Arc::new(Entity::hydrated(Arc::clone(metadata), values, associations));
		self.staged.insert(key, Arc::clone(&entity));
		Ok(Some(entity))
	}

	fn attach(&mut self, owner: &EntityRef, association: &AssociationMetadata, target: Option<&EntityRef>) -> Result<()> {
		let index = owner.metadata().association_index(association.name())?;
		match association.cardinality() {
			Cardinality::One => {
				owner.fill_deferred(index, AssociationState::One(target.cloned()));
			}
			Cardinality::Many => {
				let slot = (Arc::as_ptr(owner) as usize, index);
				if !self.collections.contains(&slot) {
					if !owner.fill_deferred(index, AssociationState::Many(Vec::new())) {
						return Ok(());
					}
					self.collections.insert(slot);
				}
				if let Some(target) = target {
					owner.push_unique(index, target);
				}
			}
		}

		// The fetched side of an inverse association points back at its owner.
		if let (Some(target), Some(mapped_by)) = (target, association.mapped_by()) {
			let back = target.metadata().association_index(mapped_by)?;
			target.fill_deferred(back, AssociationState::One(Some(Arc::clone(owner))));
		}
		Ok(())
	}
}
