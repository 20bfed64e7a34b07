//! Query results
//!
//! Every row of a compiled query becomes a [`Record`]: a scalar, an entity,
//! or a [`Tuple`] of those when several projections are selected. Terminal
//! fetch operations convert records into the caller's type through
//! [`FromRecord`].

use std::sync::Arc;

use grappelli_core::{Error, Result, SqlType, Value};
use grappelli_query::{EntityPath, Expr, Projection, TypedExpr};

use crate::entity::EntityRef;

/// One result row.
#[derive(Debug, Clone)]
pub enum Record {
	Value(Value),
	/// An entity projection; `None` on the null side of a left join.
	Entity(Option<EntityRef>),
	Tuple(Tuple),
}

impl Record {
	fn kind(&self) -> &'static str {
		match self {
			Record::Value(_) => "value",
			Record::Entity(_) => "entity",
			Record::Tuple(_) => "tuple",
		}
	}

	/// Key under which two rows are the same `DISTINCT` row: entities compare
	/// by instance, values by content.
	pub(crate) fn distinct_key(&self) -> Vec<DistinctKey> {
		match self {
			Record::Tuple(tuple) => tuple.items.iter().flat_map(Record::distinct_key).collect(),
			Record::Entity(entity) => vec![DistinctKey::Entity(entity.as_ref().map(|e| Arc::as_ptr(e) as usize))],
			Record::Value(value) => vec![DistinctKey::from(value)],
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DistinctKey {
	Null,
	Bool(bool),
	Int(i64),
	Float(u64),
	Text(String),
	Entity(Option<usize>),
}

impl From<&Value> for DistinctKey {
	fn from(value: &Value) -> Self {
		match value {
			Value::Null => DistinctKey::Null,
			Value::Bool(b) => DistinctKey::Bool(*b),
			Value::Int(i) => DistinctKey::Int(*i),
			Value::Float(f) => DistinctKey::Float(f.to_bits()),
			Value::Text(s) => DistinctKey::Text(s.clone()),
		}
	}
}

/// Several projections of one row, addressable by position or by the
/// projected expression.
#[derive(Debug, Clone)]
pub struct Tuple {
	keys: Arc<[Projection]>,
	items: Vec<Record>,
}

impl Tuple {
	pub(crate) fn new(keys: Arc<[Projection]>, items: Vec<Record>) -> Self {
		Self { keys, items }
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn items(&self) -> &[Record] {
		&self.items
	}

	/// Read one item.
	///
	/// ```rust,ignore
	/// let name: Option<String> = tuple.get(&user_name)?;
	/// let age: i32 = tuple.get(1usize)?;
	/// ```
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] when the key is not part of the
	/// select list and [`Error::Decode`] when the item does not convert.
	pub fn get<R: FromRecord>(&self, key: impl TupleKey) -> Result<R> {
		let position = key.position(&self.keys)?;
		let item = self
			.items
			.get(position)
			.cloned()
			.ok_or_else(|| Error::InvalidArgument(format!("tuple has no item {}", position)))?;
		R::from_record(item)
	}
}

/// Addresses an item of a [`Tuple`].
pub trait TupleKey {
	fn position(&self, keys: &[Projection]) -> Result<usize>;
}

impl TupleKey for usize {
	fn position(&self, keys: &[Projection]) -> Result<usize> {
		if *self < keys.len() {
			Ok(*self)
		} else {
			Err(Error::InvalidArgument(format!(
				"tuple position {} out of {} items",
				self,
				keys.len()
			)))
		}
	}
}

fn expr_position(expr: &Expr, keys: &[Projection]) -> Result<usize> {
	keys.iter()
		.position(|key| key.as_expr() == Some(expr))
		.ok_or_else(|| Error::InvalidArgument(format!("{:?} is not projected", expr)))
}

impl TupleKey for &Expr {
	fn position(&self, keys: &[Projection]) -> Result<usize> {
		expr_position(self, keys)
	}
}

impl<T: SqlType> TupleKey for &TypedExpr<T> {
	fn position(&self, keys: &[Projection]) -> Result<usize> {
		expr_position(self.expr(), keys)
	}
}

impl TupleKey for &EntityPath {
	fn position(&self, keys: &[Projection]) -> Result<usize> {
		keys.iter()
			.position(|key| matches!(key, Projection::Entity(path) if path == *self))
			.ok_or_else(|| Error::InvalidArgument(format!("entity {} is not projected", self.alias())))
	}
}

/// Conversion of a [`Record`] into a result type.
pub trait FromRecord: Sized + Send {
	fn from_record(record: Record) -> Result<Self>;
}

fn mismatch(expected: &'static str, record: &Record) -> Error {
	Error::Decode {
		expected,
		value: record.kind().to_string(),
	}
}

impl FromRecord for Record {
	fn from_record(record: Record) -> Result<Self> {
		Ok(record)
	}
}

impl FromRecord for Value {
	fn from_record(record: Record) -> Result<Self> {
		match record {
			Record::Value(value) => Ok(value),
			other => Err(mismatch("value", &other)),
		}
	}
}

impl FromRecord for Option<EntityRef> {
	fn from_record(record: Record) -> Result<Self> {
		match record {
			Record::Entity(entity) => Ok(entity),
			other => Err(mismatch("entity", &other)),
		}
	}
}

impl FromRecord for EntityRef {
	fn from_record(record: Record) -> Result<Self> {
		match record {
			Record::Entity(Some(entity)) => Ok(entity),
			Record::Entity(None) => Err(Error::Decode {
				expected: "entity",
				value: Value::Null.to_string(),
			}),
			other => Err(mismatch("entity", &other)),
		}
	}
}

impl FromRecord for Tuple {
	fn from_record(record: Record) -> Result<Self> {
		match record {
			Record::Tuple(tuple) => Ok(tuple),
			other => Err(mismatch("tuple", &other)),
		}
	}
}

macro_rules! scalar_from_record {
	($($ty:ty),* $(,)?) => {
		$(
			impl FromRecord for $ty {
				fn from_record(record: Record) -> Result<Self> {
					<$ty>::try_from(Value::from_record(record)?)
				}
			}

			impl FromRecord for Option<$ty> {
				fn from_record(record: Record) -> Result<Self> {
					match Value::from_record(record)? {
						Value::Null => Ok(None),
						value => <$ty>::try_from(value).map(Some),
					}
				}
			}
		)*
	};
}

scalar_from_record!(bool, i32, i64, f64, String);

/// A page of results with the total row count of the unpaged query.
#[derive(Debug, Clone)]
pub struct QueryResults<R> {
	results: Vec<R>,
	total: u64,
	offset: Option<u64>,
	limit: Option<u64>,
}

impl<R> QueryResults<R> {
	pub(crate) fn new(results: Vec<R>, total: u64, offset: Option<u64>, limit: Option<u64>) -> Self {
		Self {
			results,
			total,
			offset,
			limit,
		}
	}

	pub fn results(&self) -> &[R] {
		&self.results
	}

	pub fn into_results(self) -> Vec<R> {
		self.results
	}

	/// Rows matched without offset and limit.
	pub fn total(&self) -> u64 {
		self.total
	}

	pub fn offset(&self) -> Option<u64> {
		self.offset
	}

	pub fn limit(&self) -> Option<u64> {
		self.limit
	}

	pub fn is_empty(&self) -> bool {
		self.results.is_empty()
	}
}
