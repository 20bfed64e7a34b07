//! Expression model
//!
//! Path expressions rooted at entity aliases, literals, aggregates and
//! subqueries ([`Expr`]), boolean predicates over them ([`Predicate`]) and
//! ordering specifiers ([`OrderSpecifier`]).
//!
//! Two levels of typing are offered:
//!
//! - [`TypedExpr<T>`] carries the Rust type of the expression, so comparing
//!   `member.age` with a string does not compile;
//! - [`Expr`] is the untyped tree; its comparison constructors check both
//!   sides at build time and fail with `TypeMismatch`.

mod expression;
mod order;
mod path;
mod predicate;
mod typed;

pub use expression::{Aggregate, AggregateFunc, Expr, Projection};
pub use order::{NullOrdering, Order, OrderSpecifier};
pub use path::{AssociationPath, EntityPath, PathExpr};
pub use predicate::{CompareOp, InList, Predicate};
pub use typed::{InOperand, Operand, TypedExpr};
