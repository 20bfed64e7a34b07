//! Entity instances
//!
//! An [`Entity`] is a dynamically shaped instance of an [`EntityMetadata`]:
//! one value per scalar field and one [`AssociationState`] per association.
//! Instances are shared as [`EntityRef`] so that the identity map, query
//! results and associations of other instances all point at the same object.
//!
//! Associations that were not fetched stay [`AssociationState::Deferred`]
//! until [`Session::resolve`](crate::session::Session::resolve) loads them.
//! Bidirectional associations hold strong references in both directions, so
//! a loaded graph lives until every handle to it is dropped.

use std::fmt;
use std::mem;
use std::sync::Arc;

use grappelli_core::{Error, Result, SqlType, Value};
use grappelli_query::metadata::{AssociationMetadata, Cardinality};
use grappelli_query::EntityMetadata;
use indexmap::IndexSet;
use parking_lot::RwLock;

pub type EntityRef = Arc<Entity>;

/// Load state of one association of an instance.
#[derive(Debug, Clone)]
pub enum AssociationState {
	/// Not loaded. Holds the join key: the foreign key for an owning
	/// association, the owner's primary key for an inverse one.
	Deferred(Value),
	/// Loaded to-one association; `None` when nothing is associated.
	One(Option<EntityRef>),
	/// Loaded to-many association.
	Many(Vec<EntityRef>),
}

impl AssociationState {
	pub fn is_loaded(&self) -> bool {
		!matches!(self, AssociationState::Deferred(_))
	}
}

struct EntityState {
	values: Vec<Value>,
	associations: Vec<AssociationState>,
	managed: bool,
	dirty: IndexSet<String>,
}

pub struct Entity {
	metadata: Arc<EntityMetadata>,
	state: RwLock<EntityState>,
}

impl Entity {
	/// A transient instance: every field `NULL`, every association loaded
	/// and empty.
	pub fn new(metadata: Arc<EntityMetadata>) -> Self {
		let values = vec![Value::Null; metadata.fields().len()];
		let associations = metadata
			.associations()
			.iter()
			.map(|a| match a.cardinality() {
				Cardinality::One => AssociationState::One(None),
				Cardinality::Many => AssociationState::Many(Vec::new()),
			})
			.collect();
		Self::with_state(metadata, values, associations, false)
	}

	pub(crate) fn hydrated(
		metadata: Arc<EntityMetadata>,
		values: Vec<Value>,
		associations: Vec<AssociationState>,
	) -> Self {
		Self::with_state(metadata, values, associations, true)
	}

	fn with_state(
		metadata: Arc<EntityMetadata>,
		values: Vec<Value>,
		associations: Vec<AssociationState>,
		managed: bool,
	) -> Self {
		Self {
			metadata,
			state: RwLock::new(EntityState {
				values,
				associations,
				managed,
				dirty: IndexSet::new(),
			}),
		}
	}

	pub fn name(&self) -> &str {
		self.metadata.name()
	}

	pub fn metadata(&self) -> &Arc<EntityMetadata> {
		&self.metadata
	}

	/// Primary key, `NULL` until the instance is persisted.
	pub fn id(&self) -> Value {
		self.state.read().values[self.metadata.primary_key_index()].clone()
	}

	pub fn value(&self, field: &str) -> Result<Value> {
		let index = self.metadata.field_index(field)?;
		Ok(self.state.read().values[index].clone())
	}

	/// Typed field value; `None` for `NULL`.
	pub fn get<T: SqlType>(&self, field: &str) -> Result<Option<T>> {
		match self.value(field)? {
			Value::Null => Ok(None),
			value => T::try_from(value).map(Some),
		}
	}

	/// Assign a scalar field. On a managed instance the change is picked up
	/// by the next flush.
	///
	/// # Errors
	///
	/// - [`Error::UnknownField`] when the entity has no such field
	/// - [`Error::TypeMismatch`] when the value does not fit the field type
	/// - [`Error::InvalidArgument`] when changing the key of a managed instance
	pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
		let index = self.metadata.field_index(field)?;
		let metadata = &self.metadata.fields()[index];
		let value = value.into();
		if let Some(actual) = value.semantic_type()
			&& !metadata.semantic_type().is_comparable_with(actual)
		{
			return Err(Error::type_mismatch(
				format!("{}.{}", self.name(), field),
				metadata.semantic_type(),
				actual,
			));
		}
		let value = metadata.semantic_type().coerce(value)?;

		let mut state = self.state.write();
		if index == self.metadata.primary_key_index() && state.managed {
			return Err(Error::InvalidArgument(format!(
				"the primary key of a managed {} cannot change",
				self.name()
			)));
		}
		if state.values[index] != value {
			state.values[index] = value;
			if state.managed {
				state.dirty.insert(metadata.column().to_string());
			}
		}
		Ok(())
	}

	/// Point an owning to-one association at `target` (or at nothing).
	///
	/// Loaded inverse collections on the previous and new targets are kept
	/// in sync; deferred ones are left alone.
	pub fn set_reference(self: &Arc<Self>, association: &str, target: Option<&EntityRef>) -> Result<()> {
		let index = self.metadata.association_index(association)?;
		let metadata = &self.metadata.associations()[index];
		if !metadata.is_owning() {
			return Err(Error::InvalidArgument(format!(
				"{}.{} is not the owning side of its association",
				self.name(),
				association
			)));
		}
		if let Some(target) = target
			&& target.name() != metadata.target()
		{
			return Err(Error::InvalidArgument(format!(
				"{}.{} expects {}, got {}",
				self.name(),
				association,
				metadata.target(),
				target.name()
			)));
		}

		let previous = {
			let mut state = self.state.write();
			if state.managed {
				state.dirty.insert(metadata.owner_column().to_string());
			}
			mem::replace(
				&mut state.associations[index],
				AssociationState::One(target.cloned()),
			)
		};

		if let AssociationState::One(Some(old)) = previous {
			old.unlink_inverse(metadata, self);
		}
		if let Some(target) = target {
			target.link_inverse(metadata, self);
		}
		Ok(())
	}

	pub fn association(&self, name: &str) -> Result<AssociationState> {
		let index = self.metadata.association_index(name)?;
		Ok(self.association_at(index))
	}

	pub fn is_loaded(&self, name: &str) -> Result<bool> {
		Ok(self.association(name)?.is_loaded())
	}

	/// Loaded to-one association.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] when the association is to-many or
	/// still deferred.
	pub fn reference(&self, name: &str) -> Result<Option<EntityRef>> {
		match self.association(name)? {
			AssociationState::One(target) => Ok(target),
			AssociationState::Many(_) => Err(Error::InvalidArgument(format!(
				"{}.{} is a collection",
				self.name(),
				name
			))),
			AssociationState::Deferred(_) => Err(self.not_loaded(name)),
		}
	}

	/// Loaded to-many association.
	pub fn collection(&self, name: &str) -> Result<Vec<EntityRef>> {
		match self.association(name)? {
			AssociationState::Many(items) => Ok(items),
			AssociationState::One(_) => Err(Error::InvalidArgument(format!(
				"{}.{} is not a collection",
				self.name(),
				name
			))),
			AssociationState::Deferred(_) => Err(self.not_loaded(name)),
		}
	}

	fn not_loaded(&self, name: &str) -> Error {
		Error::InvalidArgument(format!(
			"{}.{} is not loaded, resolve it through the session",
			self.name(),
			name
		))
	}

	/// Whether the instance belongs to a unit of work.
	pub fn is_managed(&self) -> bool {
		self.state.read().managed
	}

	/// Whether a managed instance has changes not yet flushed.
	pub fn is_dirty(&self) -> bool {
		!self.state.read().dirty.is_empty()
	}

	pub(crate) fn association_at(&self, index: usize) -> AssociationState {
		self.state.read().associations[index].clone()
	}

	/// Replace a deferred association; loaded ones are kept. Returns whether
	/// the state was replaced.
	pub(crate) fn fill_deferred(&self, index: usize, loaded: AssociationState) -> bool {
		let mut state = self.state.write();
		if state.associations[index].is_loaded() {
			return false;
		}
		state.associations[index] = loaded;
		true
	}

	/// Append to a loaded collection unless the instance is already in it.
	pub(crate) fn push_unique(&self, index: usize, item: &EntityRef) {
		let mut state = self.state.write();
		if let AssociationState::Many(items) = &mut state.associations[index]
			&& !items.iter().any(|existing| Arc::ptr_eq(existing, item))
		{
			items.push(Arc::clone(item));
		}
	}

	pub(crate) fn assign_id(&self, id: Value) -> Result<()> {
		let key = self.metadata.primary_key();
		let id = key.semantic_type().coerce(id)?;
		self.state.write().values[self.metadata.primary_key_index()] = id;
		Ok(())
	}

	pub(crate) fn mark_managed(&self) {
		let mut state = self.state.write();
		state.managed = true;
		state.dirty.clear();
	}

	pub(crate) fn detach(&self) {
		let mut state = self.state.write();
		state.managed = false;
		state.dirty.clear();
	}

	/// Columns and values of an `INSERT`; a `NULL` primary key is left to
	/// the store.
	pub(crate) fn insert_assignments(&self) -> Result<Vec<(String, Value)>> {
		let state = self.state.read();
		let key_index = self.metadata.primary_key_index();
		let mut assignments = Vec::with_capacity(self.metadata.column_count());
		for (index, (field, value)) in self.metadata.fields().iter().zip(&state.values).enumerate() {
			if index == key_index && value.is_null() {
				continue;
			}
			assignments.push((field.column().to_string(), value.clone()));
		}
		for (association, value) in self.metadata.associations().iter().zip(&state.associations) {
			if association.is_owning() {
				assignments.push((
					association.owner_column().to_string(),
					self.foreign_key(association, value)?,
				));
			}
		}
		Ok(assignments)
	}

	/// Changed columns since the last flush, in change order. Clears them.
	pub(crate) fn take_changes(&self) -> Result<Vec<(String, Value)>> {
		let mut state = self.state.write();
		let dirty = mem::take(&mut state.dirty);
		let mut changes = Vec::with_capacity(dirty.len());
		for column in dirty {
			if let Some(index) = self.metadata.fields().iter().position(|f| f.column() == column) {
				changes.push((column, state.values[index].clone()));
			} else if let Some(index) = self
				.metadata
				.associations()
				.iter()
				.position(|a| a.is_owning() && a.owner_column() == column)
			{
				let association = &self.metadata.associations()[index];
				let value = self.foreign_key(association, &state.associations[index])?;
				changes.push((column, value));
			}
		}
		Ok(changes)
	}

	fn foreign_key(&self, association: &AssociationMetadata, state: &AssociationState) -> Result<Value> {
		match state {
			AssociationState::Deferred(key) => Ok(key.clone()),
			AssociationState::One(None) => Ok(Value::Null),
			AssociationState::One(Some(target)) => {
				let id = target.id();
				if id.is_null() {
					return Err(Error::InvalidArgument(format!(
						"{}.{} points at a {} that has not been persisted",
						self.name(),
						association.name(),
						target.name()
					)));
				}
				Ok(id)
			}
			AssociationState::Many(_) => Ok(Value::Null),
		}
	}

	fn inverse_index(&self, owning: &AssociationMetadata) -> Option<usize> {
		self.metadata.associations().iter().position(|a| {
			!a.is_owning() && a.mapped_by() == Some(owning.name()) && a.target() == owning.owner()
		})
	}

	fn link_inverse(&self, owning: &AssociationMetadata, owner: &EntityRef) {
		let Some(index) = self.inverse_index(owning) else {
			return;
		};
		let mut state = self.state.write();
		match &mut state.associations[index] {
			AssociationState::Many(items) => {
				if !items.iter().any(|item| Arc::ptr_eq(item, owner)) {
					items.push(Arc::clone(owner));
				}
			}
			AssociationState::One(current) => *current = Some(Arc::clone(owner)),
			AssociationState::Deferred(_) => {}
		}
	}

	fn unlink_inverse(&self, owning: &AssociationMetadata, owner: &EntityRef) {
		let Some(index) = self.inverse_index(owning) else {
			return;
		};
		let mut state = self.state.write();
		match &mut state.associations[index] {
			AssociationState::Many(items) => items.retain(|item| !Arc::ptr_eq(item, owner)),
			AssociationState::One(current) => {
				if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, owner)) {
					*current = None;
				}
			}
			AssociationState::Deferred(_) => {}
		}
	}
}

impl fmt::Debug for Entity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.read();
		f.debug_struct("Entity")
			.field("entity", &self.name())
			.field("values", &state.values)
			.field("managed", &state.managed)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::registry;
	use grappelli_core::SemanticType;
	use rstest::*;

	#[fixture]
	fn member() -> EntityRef {
		Arc::new(Entity::new(registry().describe("Member").unwrap()))
	}

	#[fixture]
	fn team() -> EntityRef {
		Arc::new(Entity::new(registry().describe("Team").unwrap()))
	}

	#[rstest]
	fn test_transient_instance(member: EntityRef) {
		assert!(member.id().is_null());
		assert!(!member.is_managed());
		assert_eq!(member.reference("team").unwrap().map(|t| t.id()), None);
	}

	#[rstest]
	fn test_set_and_get(member: EntityRef) {
		member.set("user_name", "김영민").unwrap();
		member.set("age", 33).unwrap();

		assert_eq!(member.get::<String>("user_name").unwrap().as_deref(), Some("김영민"));
		assert_eq!(member.get::<i32>("age").unwrap(), Some(33));
		assert!(!member.is_dirty());
	}

	#[rstest]
	fn test_set_rejects_incompatible_type(member: EntityRef) {
		let err = member.set("age", "thirty").unwrap_err();
		assert!(matches!(
			err,
			Error::TypeMismatch {
				left: SemanticType::Integer,
				right: SemanticType::Text,
				..
			}
		));
	}

	#[rstest]
	fn test_managed_changes_are_tracked(member: EntityRef) {
		member.assign_id(Value::Int(1)).unwrap();
		member.set("age", 33).unwrap();
		member.mark_managed();

		member.set("age", 33).unwrap();
		assert!(!member.is_dirty());

		member.set("age", 34).unwrap();
		assert!(member.is_dirty());
		assert_eq!(member.take_changes().unwrap(), vec![("age".to_string(), Value::Int(34))]);
		assert!(!member.is_dirty());
	}

	#[rstest]
	fn test_managed_key_is_fixed(member: EntityRef) {
		member.assign_id(Value::Int(1)).unwrap();
		member.mark_managed();
		assert!(matches!(member.set("id", 2), Err(Error::InvalidArgument(_))));
	}

	#[rstest]
	fn test_set_reference_syncs_loaded_collection(member: EntityRef, team: EntityRef) {
		member.set_reference("team", Some(&team)).unwrap();
		assert!(Arc::ptr_eq(&team.collection("members").unwrap()[0], &member));

		member.set_reference("team", None).unwrap();
		assert!(team.collection("members").unwrap().is_empty());
	}

	#[rstest]
	fn test_set_reference_checks_target(member: EntityRef) {
		let other = Arc::new(Entity::new(registry().describe("Member").unwrap()));
		assert!(member.set_reference("team", Some(&other)).is_err());
	}

	#[rstest]
	fn test_insert_assignments_need_persisted_reference(member: EntityRef, team: EntityRef) {
		member.set("user_name", "원영식").unwrap();
		member.set_reference("team", Some(&team)).unwrap();
		assert!(member.insert_assignments().is_err());

		team.assign_id(Value::Int(7)).unwrap();
		let assignments = member.insert_assignments().unwrap();
		assert_eq!(
			assignments,
			vec![
				("user_name".to_string(), Value::from("원영식")),
				("age".to_string(), Value::Null),
				("team_id".to_string(), Value::Int(7)),
			]
		);
	}

	#[rstest]
	fn test_fill_deferred_keeps_loaded_state() {
		let metadata = registry().describe("Member").unwrap();
		let member = Entity::hydrated(
			metadata,
			vec![Value::Int(1), Value::from("김진엽"), Value::Int(27)],
			vec![AssociationState::Deferred(Value::Int(2))],
		);
		assert!(!member.is_loaded("team").unwrap());
		assert!(matches!(member.reference("team"), Err(Error::InvalidArgument(_))));

		assert!(member.fill_deferred(0, AssociationState::One(None)));
		assert!(!member.fill_deferred(0, AssociationState::One(None)));
		assert!(member.is_loaded("team").unwrap());
	}
}
