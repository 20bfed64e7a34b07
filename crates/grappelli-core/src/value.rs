//! Dynamically typed values exchanged with the store.
//!
//! [`Value`] is what literals compile to, what statement parameters carry and
//! what rows are decoded into before being mapped onto entities and tuples.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exception::{Error, Result};
use crate::types::SemanticType;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Semantic type of the value, `None` for `NULL` (compatible with anything).
	pub fn semantic_type(&self) -> Option<SemanticType> {
		match self {
			Value::Null => None,
			Value::Bool(_) => Some(SemanticType::Boolean),
			Value::Int(_) => Some(SemanticType::Integer),
			Value::Float(_) => Some(SemanticType::Float),
			Value::Text(_) => Some(SemanticType::Text),
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Text(s) => Some(s),
			_ => None,
		}
	}

	fn decode_error(expected: &'static str, value: &Value) -> Error {
		Error::Decode {
			expected,
			value: value.to_string(),
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("NULL"),
			Value::Bool(b) => write!(f, "{}", b),
			Value::Int(i) => write!(f, "{}", i),
			Value::Float(v) => write!(f, "{}", v),
			Value::Text(s) => write!(f, "'{}'", s),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Int(i64::from(value))
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Int(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Float(value)
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Text(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Text(value.to_string())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Null, Into::into)
	}
}

impl TryFrom<Value> for bool {
	type Error = Error;

	fn try_from(value: Value) -> Result<Self> {
		match value {
			Value::Bool(b) => Ok(b),
			Value::Int(i) => Ok(i != 0),
			other => Err(Value::decode_error("bool", &other)),
		}
	}
}

impl TryFrom<Value> for i64 {
	type Error = Error;

	fn try_from(value: Value) -> Result<Self> {
		match value {
			Value::Int(i) => Ok(i),
			Value::Float(f) if f.fract() == 0.0 => Ok(f as i64),
			other => Err(Value::decode_error("i64", &other)),
		}
	}
}

impl TryFrom<Value> for i32 {
	type Error = Error;

	fn try_from(value: Value) -> Result<Self> {
		let wide = i64::try_from(value.clone()).map_err(|_| Value::decode_error("i32", &value))?;
		i32::try_from(wide).map_err(|_| Value::decode_error("i32", &value))
	}
}

impl TryFrom<Value> for f64 {
	type Error = Error;

	fn try_from(value: Value) -> Result<Self> {
		match value {
			Value::Float(f) => Ok(f),
			Value::Int(i) => Ok(i as f64),
			other => Err(Value::decode_error("f64", &other)),
		}
	}
}

impl TryFrom<Value> for String {
	type Error = Error;

	fn try_from(value: Value) -> Result<Self> {
		match value {
			Value::Text(s) => Ok(s),
			other => Err(Value::decode_error("String", &other)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_option_into_value() {
		assert_eq!(Value::from(None::<String>), Value::Null);
		assert_eq!(Value::from(Some(33)), Value::Int(33));
	}

	#[rstest]
	#[case(Value::Int(33), 33)]
	#[case(Value::Float(28.0), 28)]
	fn test_i32_from_value(#[case] value: Value, #[case] expected: i32) {
		assert_eq!(i32::try_from(value).unwrap(), expected);
	}

	#[rstest]
	fn test_i32_out_of_range() {
		let err = i32::try_from(Value::Int(i64::MAX)).unwrap_err();
		assert!(matches!(err, Error::Decode { expected: "i32", .. }));
	}

	#[rstest]
	fn test_string_rejects_null() {
		let err = String::try_from(Value::Null).unwrap_err();
		assert_eq!(err.to_string(), "Cannot decode NULL as String");
	}

	#[rstest]
	fn test_semantic_type_of_literal() {
		assert_eq!(Value::from("임수현").semantic_type(), Some(SemanticType::Text));
		assert_eq!(Value::Null.semantic_type(), None);
	}
}
