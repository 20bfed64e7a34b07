//! Semantic types of entity fields and expressions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exception::{Error, Result};
use crate::value::Value;

/// Semantic type of a field, literal or expression.
///
/// Integer and float form one numeric family: they may be compared with each
/// other. Text and boolean only compare with themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
	Integer,
	Float,
	Text,
	Boolean,
}

impl SemanticType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Integer => "integer",
			Self::Float => "float",
			Self::Text => "text",
			Self::Boolean => "boolean",
		}
	}

	pub fn is_numeric(self) -> bool {
		matches!(self, Self::Integer | Self::Float)
	}

	/// Whether a value of this type may appear on the other side of a
	/// comparison with `other`.
	pub fn is_comparable_with(self, other: SemanticType) -> bool {
		self == other || (self.is_numeric() && other.is_numeric())
	}

	/// Convert a value read from the store into this type.
	///
	/// Stores without native booleans hand back integers, and some return
	/// whole floats for integer columns; both are normalized here. `NULL`
	/// passes through unchanged.
	pub fn coerce(self, value: Value) -> Result<Value> {
		match (self, value) {
			(_, Value::Null) => Ok(Value::Null),
			(Self::Integer, Value::Int(i)) => Ok(Value::Int(i)),
			(Self::Integer, Value::Float(f)) if f.fract() == 0.0 => Ok(Value::Int(f as i64)),
			(Self::Integer, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
			(Self::Float, Value::Float(f)) => Ok(Value::Float(f)),
			(Self::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
			(Self::Text, Value::Text(s)) => Ok(Value::Text(s)),
			(Self::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
			(Self::Boolean, Value::Int(i)) => Ok(Value::Bool(i != 0)),
			(ty, other) => Err(Error::Decode {
				expected: ty.as_str(),
				value: other.to_string(),
			}),
		}
	}
}

impl fmt::Display for SemanticType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Rust types that map onto a [`SemanticType`].
///
/// Typed expressions carry one of these as their type parameter, which lets
/// the compiler reject `member.age.eq("x")` before a plan is ever built.
pub trait SqlType: Into<Value> + TryFrom<Value, Error = Error> + Send + Sync + 'static {
	const SEMANTIC: SemanticType;
}

/// Numeric [`SqlType`]s, the only ones accepted by `avg` and `sum`.
pub trait Numeric: SqlType {}

impl SqlType for i32 {
	const SEMANTIC: SemanticType = SemanticType::Integer;
}

impl SqlType for i64 {
	const SEMANTIC: SemanticType = SemanticType::Integer;
}

impl SqlType for f64 {
	const SEMANTIC: SemanticType = SemanticType::Float;
}

impl SqlType for String {
	const SEMANTIC: SemanticType = SemanticType::Text;
}

impl SqlType for bool {
	const SEMANTIC: SemanticType = SemanticType::Boolean;
}

impl Numeric for i32 {}
impl Numeric for i64 {}
impl Numeric for f64 {}
