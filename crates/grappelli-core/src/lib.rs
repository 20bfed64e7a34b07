//! # Grappelli Core
//!
//! Value model and error types shared by the query builder and the execution
//! layer.
//!
//! - [`Value`]: dynamically typed SQL value
//! - [`SemanticType`] / [`SqlType`]: field types and their Rust counterparts
//! - [`Error`]: the single error enum reported by every layer

pub mod exception;
pub mod types;
pub mod value;

pub use exception::{Error, Result};
pub use types::{Numeric, SemanticType, SqlType};
pub use value::Value;
