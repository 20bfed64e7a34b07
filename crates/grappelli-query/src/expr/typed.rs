//! Statically typed expressions.

use std::fmt;
use std::marker::PhantomData;

use grappelli_core::{Error, Numeric, Result, SqlType, Value};

use super::{Aggregate, AggregateFunc, CompareOp, Expr, InList, OrderSpecifier, Predicate};

/// An [`Expr`] whose value type is known to be `T`.
///
/// Comparison operands must implement [`Operand<T>`], so mixing types is a
/// compile error instead of a build-time one.
pub struct TypedExpr<T> {
	expr: Expr,
	_marker: PhantomData<fn() -> T>,
}

impl<T: SqlType> TypedExpr<T> {
	pub(crate) fn from_expr(expr: Expr) -> Self {
		Self {
			expr,
			_marker: PhantomData,
		}
	}

	/// Attach a type to an untyped expression.
	///
	/// # Errors
	///
	/// Returns [`Error::TypeMismatch`] unless the expression's semantic type
	/// is exactly `T`'s.
	pub fn declared(expr: Expr) -> Result<Self> {
		match expr.semantic_type() {
			Some(actual) if actual != T::SEMANTIC => Err(Error::type_mismatch(
				"declared column type",
				T::SEMANTIC,
				actual,
			)),
			_ => Ok(Self::from_expr(expr)),
		}
	}

	/// A bound literal.
	pub fn literal(value: T) -> Self {
		Self::from_expr(Expr::Literal(value.into()))
	}

	pub fn expr(&self) -> &Expr {
		&self.expr
	}

	pub fn into_expr(self) -> Expr {
		self.expr
	}

	fn compare(&self, op: CompareOp, rhs: impl Operand<T>) -> Predicate {
		Predicate::compare_unchecked(self.expr.clone(), op, rhs.into_operand())
	}

	pub fn eq(&self, rhs: impl Operand<T>) -> Predicate {
		self.compare(CompareOp::Eq, rhs)
	}

	pub fn ne(&self, rhs: impl Operand<T>) -> Predicate {
		self.compare(CompareOp::Ne, rhs)
	}

	pub fn gt(&self, rhs: impl Operand<T>) -> Predicate {
		self.compare(CompareOp::Gt, rhs)
	}

	pub fn goe(&self, rhs: impl Operand<T>) -> Predicate {
		self.compare(CompareOp::Goe, rhs)
	}

	pub fn lt(&self, rhs: impl Operand<T>) -> Predicate {
		self.compare(CompareOp::Lt, rhs)
	}

	pub fn loe(&self, rhs: impl Operand<T>) -> Predicate {
		self.compare(CompareOp::Loe, rhs)
	}

	/// Inclusive range. Reversed bounds match nothing.
	pub fn between(&self, low: impl Operand<T>, high: impl Operand<T>) -> Predicate {
		Predicate::Between {
			expr: self.expr.clone(),
			low: low.into_operand(),
			high: high.into_operand(),
		}
	}

	pub fn is_in(&self, list: impl InOperand<T>) -> Predicate {
		Predicate::In {
			expr: self.expr.clone(),
			list: list.into_in_list(),
			negated: false,
		}
	}

	pub fn not_in(&self, list: impl InOperand<T>) -> Predicate {
		Predicate::In {
			expr: self.expr.clone(),
			list: list.into_in_list(),
			negated: true,
		}
	}

	pub fn is_null(&self) -> Predicate {
		self.expr.clone().is_null()
	}

	pub fn is_not_null(&self) -> Predicate {
		self.expr.clone().is_not_null()
	}

	pub fn asc(&self) -> OrderSpecifier {
		OrderSpecifier::asc(self.expr.clone())
	}

	pub fn desc(&self) -> OrderSpecifier {
		OrderSpecifier::desc(self.expr.clone())
	}

	fn aggregate<R: SqlType>(&self, func: AggregateFunc, distinct: bool) -> TypedExpr<R> {
		TypedExpr::from_expr(Expr::Aggregate(Aggregate::new(
			func,
			self.expr.clone(),
			distinct,
		)))
	}

	pub fn count(&self) -> TypedExpr<i64> {
		self.aggregate(AggregateFunc::Count, false)
	}

	pub fn count_distinct(&self) -> TypedExpr<i64> {
		self.aggregate(AggregateFunc::Count, true)
	}

	pub fn max(&self) -> TypedExpr<T> {
		self.aggregate(AggregateFunc::Max, false)
	}

	pub fn min(&self) -> TypedExpr<T> {
		self.aggregate(AggregateFunc::Min, false)
	}
}

impl<T: Numeric> TypedExpr<T> {
	pub fn avg(&self) -> TypedExpr<f64> {
		self.aggregate(AggregateFunc::Avg, false)
	}

	pub fn sum(&self) -> TypedExpr<T> {
		self.aggregate(AggregateFunc::Sum, false)
	}
}

impl<T> Clone for TypedExpr<T> {
	fn clone(&self) -> Self {
		Self {
			expr: self.expr.clone(),
			_marker: PhantomData,
		}
	}
}

impl<T> PartialEq for TypedExpr<T> {
	fn eq(&self, other: &Self) -> bool {
		self.expr == other.expr
	}
}

impl<T> fmt::Debug for TypedExpr<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TypedExpr")
			.field("type", &std::any::type_name::<T>())
			.field("expr", &self.expr)
			.finish()
	}
}

/// Right-hand side of a typed comparison against a `TypedExpr<T>`.
pub trait Operand<T> {
	fn into_operand(self) -> Expr;
}

impl<T: SqlType> Operand<T> for TypedExpr<T> {
	fn into_operand(self) -> Expr {
		self.expr
	}
}

impl<T: SqlType> Operand<T> for &TypedExpr<T> {
	fn into_operand(self) -> Expr {
		self.expr.clone()
	}
}

macro_rules! literal_operand {
	($($target:ty => [$($source:ty),*]),* $(,)?) => {
		$($(
			impl Operand<$target> for $source {
				fn into_operand(self) -> Expr {
					Expr::Literal(Value::from(self))
				}
			}
		)*)*
	};
}

literal_operand! {
	i32 => [i32],
	i64 => [i64, i32],
	f64 => [f64, i32, i64],
	String => [String, &str],
	bool => [bool],
}

impl Operand<String> for &String {
	fn into_operand(self) -> Expr {
		Expr::Literal(Value::Text(self.clone()))
	}
}

/// Right-hand side of a typed `IN`: a list of operands, or a scalar
/// subquery obtained from [`QueryPlan::as_scalar`](crate::plan::QueryPlan::as_scalar).
pub trait InOperand<T> {
	fn into_in_list(self) -> InList;
}

impl<T, V: Operand<T>> InOperand<T> for Vec<V> {
	fn into_in_list(self) -> InList {
		InList::Values(self.into_iter().map(Operand::into_operand).collect())
	}
}

impl<T, V: Operand<T>, const N: usize> InOperand<T> for [V; N] {
	fn into_in_list(self) -> InList {
		InList::Values(self.into_iter().map(Operand::into_operand).collect())
	}
}

impl<T: SqlType> InOperand<T> for TypedExpr<T> {
	fn into_in_list(self) -> InList {
		match self.expr {
			Expr::SubQuery(plan) => InList::SubQuery(plan),
			other => InList::Values(vec![other]),
		}
	}
}
