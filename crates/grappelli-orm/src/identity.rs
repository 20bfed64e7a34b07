//! Identity map
//!
//! Within one unit of work a row is represented by at most one in-memory
//! instance. Every instance the session materializes or persists is
//! registered here under `(entity name, primary key)`.

use std::sync::Arc;

use grappelli_core::{Error, Result, Value};
use indexmap::IndexMap;

use crate::entity::EntityRef;

/// Hashable form of a primary-key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityValue {
	Int(i64),
	Text(String),
	Bool(bool),
}

impl TryFrom<&Value> for IdentityValue {
	type Error = Error;

	fn try_from(value: &Value) -> Result<Self> {
		match value {
			Value::Int(i) => Ok(Self::Int(*i)),
			Value::Text(s) => Ok(Self::Text(s.clone())),
			Value::Bool(b) => Ok(Self::Bool(*b)),
			Value::Float(_) | Value::Null => Err(Error::InvalidArgument(format!(
				"{} cannot identify an instance",
				value
			))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
	entity: String,
	id: IdentityValue,
}

impl EntityKey {
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] for `NULL` and float keys.
	pub fn new(entity: &str, id: &Value) -> Result<Self> {
		Ok(Self {
			entity: entity.to_string(),
			id: IdentityValue::try_from(id)?,
		})
	}

	pub fn entity(&self) -> &str {
		&self.entity
	}

	pub fn id(&self) -> &IdentityValue {
		&self.id
	}
}

/// `(entity, primary key) -> instance` for one unit of work.
#[derive(Debug, Default)]
pub struct IdentityMap {
	entries: IndexMap<EntityKey, EntityRef>,
}

impl IdentityMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &EntityKey) -> Option<&EntityRef> {
		self.entries.get(key)
	}

	/// Register an instance under its current primary key.
	///
	/// Registering the same instance again is a no-op.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] when the instance has no usable key
	/// or another instance is already registered under it.
	pub fn register(&mut self, entity: EntityRef) -> Result<EntityKey> {
		let key = EntityKey::new(entity.name(), &entity.id())?;
		if let Some(existing) = self.entries.get(&key) {
			if Arc::ptr_eq(existing, &entity) {
				return Ok(key);
			}
			return Err(Error::InvalidArgument(format!(
				"another {} instance with id {} is already in the unit of work",
				key.entity,
				entity.id()
			)));
		}
		self.entries.insert(key.clone(), entity);
		Ok(key)
	}

	pub fn contains(&self, entity: &EntityRef) -> bool {
		EntityKey::new(entity.name(), &entity.id())
			.ok()
			.and_then(|key| self.entries.get(&key))
			.is_some_and(|existing| Arc::ptr_eq(existing, entity))
	}

	pub fn remove(&mut self, key: &EntityKey) -> Option<EntityRef> {
		self.entries.shift_remove(key)
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Instances in registration order.
	pub fn iter(&self) -> impl Iterator<Item = &EntityRef> {
		self.entries.values()
	}
}
