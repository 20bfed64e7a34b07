//! Error types shared by every Grappelli layer.
//!
//! Building, compiling and executing a query all report failures through the
//! single [`Error`] enum so that callers can match on the kind of failure
//! without caring which layer raised it.

use std::error::Error as StdError;

use thiserror::Error;

use crate::types::SemanticType;

/// Errors raised while describing entities, building plans, compiling them
/// or executing them against a connection.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
	/// The entity name is not registered in the metadata registry.
	#[error("Unknown entity: {0}")]
	UnknownEntity(String),

	/// The entity has no scalar field with this name.
	#[error("Unknown field: {entity}.{field}")]
	UnknownField {
		/// Entity the lookup was made on.
		entity: String,
		/// Requested field name.
		field: String,
	},

	/// The entity has no association with this name.
	#[error("Unknown association: {entity}.{association}")]
	UnknownAssociation {
		/// Entity the lookup was made on.
		entity: String,
		/// Requested association name.
		association: String,
	},

	/// Both sides of a comparison (or a declared and a requested type) are
	/// not compatible.
	#[error("Type mismatch in {context}: {left} is not compatible with {right}")]
	TypeMismatch {
		/// Operation that performed the check.
		context: String,
		/// Left-hand (or declared) type.
		left: SemanticType,
		/// Right-hand (or requested) type.
		right: SemanticType,
	},

	/// An argument is outside of its domain (negative offset, NULL operand, ...).
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// The plan cannot be rendered into a valid statement.
	#[error("Invalid plan: {0}")]
	InvalidPlan(String),

	/// A unique-result fetch matched more than one row.
	#[error("Expected at most one result, found {0}")]
	NonUniqueResult(usize),

	/// The connection failed while running a statement. The original error is
	/// kept as the source.
	#[error("Execution failed: {0}")]
	Execution(#[source] Box<dyn StdError + Send + Sync>),

	/// A row value cannot be converted into the requested Rust type.
	#[error("Cannot decode {value} as {expected}")]
	Decode {
		/// Name of the requested type.
		expected: &'static str,
		/// Rendering of the offending value.
		value: String,
	},

	/// Unit-of-work state misuse (commit after rollback, ...).
	#[error("Transaction error: {0}")]
	Transaction(String),

	/// Settings could not be loaded or parsed.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl Error {
	pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
		Self::UnknownField {
			entity: entity.into(),
			field: field.into(),
		}
	}

	pub fn unknown_association(entity: impl Into<String>, association: impl Into<String>) -> Self {
		Self::UnknownAssociation {
			entity: entity.into(),
			association: association.into(),
		}
	}

	pub fn type_mismatch(context: impl Into<String>, left: SemanticType, right: SemanticType) -> Self {
		Self::TypeMismatch {
			context: context.into(),
			left,
			right,
		}
	}

	/// Wrap a connection failure without altering it.
	pub fn execution<E>(error: E) -> Self
	where
		E: Into<Box<dyn StdError + Send + Sync>>,
	{
		Self::Execution(error.into())
	}

	/// Returns `true` for errors detected before any statement reached the
	/// connection.
	pub fn is_build_error(&self) -> bool {
		matches!(
			self,
			Self::UnknownEntity(_)
				| Self::UnknownField { .. }
				| Self::UnknownAssociation { .. }
				| Self::TypeMismatch { .. }
				| Self::InvalidArgument(_)
				| Self::InvalidPlan(_)
		)
	}
}

/// Result type alias used across Grappelli crates.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case::unknown_entity(Error::UnknownEntity("Hello".into()), "Unknown entity: Hello")]
	#[case::unknown_field(Error::unknown_field("Member", "nick"), "Unknown field: Member.nick")]
	#[case::type_mismatch(
		Error::type_mismatch("eq", SemanticType::Integer, SemanticType::Text),
		"Type mismatch in eq: integer is not compatible with text"
	)]
	#[case::non_unique(Error::NonUniqueResult(5), "Expected at most one result, found 5")]
	fn test_error_display(#[case] error: Error, #[case] expected: &str) {
		assert_eq!(error.to_string(), expected);
	}

	#[rstest]
	fn test_execution_keeps_source() {
		let io = std::io::Error::other("connection reset");
		let error = Error::execution(io);

		let source = error.source().map(|s| s.to_string());
		assert_eq!(source.as_deref(), Some("connection reset"));
		assert!(!error.is_build_error());
	}

	#[rstest]
	fn test_build_errors() {
		assert!(Error::InvalidPlan("no projection".into()).is_build_error());
		assert!(Error::InvalidArgument("offset".into()).is_build_error());
		assert!(!Error::NonUniqueResult(2).is_build_error());
	}
}
