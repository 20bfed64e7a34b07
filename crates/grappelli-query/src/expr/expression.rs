//! Untyped expression tree and projections.

use grappelli_core::{Error, Result, SemanticType, SqlType, Value};

use super::{CompareOp, EntityPath, InList, OrderSpecifier, PathExpr, Predicate, TypedExpr};
use crate::plan::QueryPlan;

/// Aggregate functions usable in projections, `having` and `order by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
	Count,
	Avg,
	Max,
	Min,
	Sum,
}

impl AggregateFunc {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Count => "COUNT",
			Self::Avg => "AVG",
			Self::Max => "MAX",
			Self::Min => "MIN",
			Self::Sum => "SUM",
		}
	}
}

/// An aggregate call over one argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
	func: AggregateFunc,
	arg: Box<Expr>,
	distinct: bool,
}

impl Aggregate {
	pub(crate) fn new(func: AggregateFunc, arg: Expr, distinct: bool) -> Self {
		Self {
			func,
			arg: Box::new(arg),
			distinct,
		}
	}

	pub fn func(&self) -> AggregateFunc {
		self.func
	}

	pub fn arg(&self) -> &Expr {
		&self.arg
	}

	pub fn is_distinct(&self) -> bool {
		self.distinct
	}
}

/// A scalar-valued expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	/// Column reached from an alias.
	Path(PathExpr),
	/// Bound parameter (or inline `NULL`).
	Literal(Value),
	Aggregate(Aggregate),
	/// Scalar subquery; the plan projects exactly one scalar expression.
	SubQuery(Box<QueryPlan>),
}

impl Expr {
	pub fn literal(value: impl Into<Value>) -> Self {
		Expr::Literal(value.into())
	}

	/// Embed a plan as a scalar subquery.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidPlan`] unless the plan projects exactly one
	/// scalar expression.
	pub fn subquery(plan: QueryPlan) -> Result<Self> {
		plan.scalar_type()?;
		Ok(Expr::SubQuery(Box::new(plan)))
	}

	/// Semantic type of the expression; `None` for a `NULL` literal.
	pub fn semantic_type(&self) -> Option<SemanticType> {
		match self {
			Expr::Path(path) => Some(path.semantic_type()),
			Expr::Literal(value) => value.semantic_type(),
			Expr::Aggregate(aggregate) => match aggregate.func {
				AggregateFunc::Count => Some(SemanticType::Integer),
				AggregateFunc::Avg => Some(SemanticType::Float),
				AggregateFunc::Max | AggregateFunc::Min | AggregateFunc::Sum => {
					aggregate.arg.semantic_type()
				}
			},
			Expr::SubQuery(plan) => plan.scalar_type().ok().flatten(),
		}
	}

	pub fn is_aggregate(&self) -> bool {
		matches!(self, Expr::Aggregate(_))
	}

	fn compare(self, op: CompareOp, rhs: impl Into<Expr>) -> Result<Predicate> {
		Predicate::compare_checked(self, op, rhs.into())
	}

	pub fn eq(self, rhs: impl Into<Expr>) -> Result<Predicate> {
		self.compare(CompareOp::Eq, rhs)
	}

	pub fn ne(self, rhs: impl Into<Expr>) -> Result<Predicate> {
		self.compare(CompareOp::Ne, rhs)
	}

	pub fn gt(self, rhs: impl Into<Expr>) -> Result<Predicate> {
		self.compare(CompareOp::Gt, rhs)
	}

	pub fn goe(self, rhs: impl Into<Expr>) -> Result<Predicate> {
		self.compare(CompareOp::Goe, rhs)
	}

	pub fn lt(self, rhs: impl Into<Expr>) -> Result<Predicate> {
		self.compare(CompareOp::Lt, rhs)
	}

	pub fn loe(self, rhs: impl Into<Expr>) -> Result<Predicate> {
		self.compare(CompareOp::Loe, rhs)
	}

	/// `self BETWEEN low AND high`. The bounds are not checked for order: an
	/// empty range simply matches nothing.
	pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Result<Predicate> {
		let (low, high) = (low.into(), high.into());
		check_operand("between", &self, &low)?;
		check_operand("between", &self, &high)?;
		Ok(Predicate::Between {
			expr: self,
			low,
			high,
		})
	}

	/// `self IN (values...)`. An empty list matches nothing.
	pub fn is_in<I, V>(self, values: I) -> Result<Predicate>
	where
		I: IntoIterator<Item = V>,
		V: Into<Expr>,
	{
		self.in_list(values, false)
	}

	pub fn not_in<I, V>(self, values: I) -> Result<Predicate>
	where
		I: IntoIterator<Item = V>,
		V: Into<Expr>,
	{
		self.in_list(values, true)
	}

	fn in_list<I, V>(self, values: I, negated: bool) -> Result<Predicate>
	where
		I: IntoIterator<Item = V>,
		V: Into<Expr>,
	{
		let values: Vec<Expr> = values.into_iter().map(Into::into).collect();
		for value in &values {
			check_operand("in", &self, value)?;
		}
		Ok(Predicate::In {
			expr: self,
			list: InList::Values(values),
			negated,
		})
	}

	/// `self IN (subquery)`.
	pub fn in_subquery(self, plan: QueryPlan) -> Result<Predicate> {
		self.subquery_list(plan, false)
	}

	pub fn not_in_subquery(self, plan: QueryPlan) -> Result<Predicate> {
		self.subquery_list(plan, true)
	}

	fn subquery_list(self, plan: QueryPlan, negated: bool) -> Result<Predicate> {
		let element = plan.scalar_type()?;
		check_types("in", self.semantic_type(), element)?;
		Ok(Predicate::In {
			expr: self,
			list: InList::SubQuery(Box::new(plan)),
			negated,
		})
	}

	pub fn is_null(self) -> Predicate {
		Predicate::IsNull {
			expr: self,
			negated: false,
		}
	}

	pub fn is_not_null(self) -> Predicate {
		Predicate::IsNull {
			expr: self,
			negated: true,
		}
	}

	pub fn count(self) -> Expr {
		Expr::Aggregate(Aggregate::new(AggregateFunc::Count, self, false))
	}

	pub fn count_distinct(self) -> Expr {
		Expr::Aggregate(Aggregate::new(AggregateFunc::Count, self, true))
	}

	pub fn max(self) -> Expr {
		Expr::Aggregate(Aggregate::new(AggregateFunc::Max, self, false))
	}

	pub fn min(self) -> Expr {
		Expr::Aggregate(Aggregate::new(AggregateFunc::Min, self, false))
	}

	/// # Errors
	///
	/// Returns [`Error::TypeMismatch`] for non-numeric arguments.
	pub fn avg(self) -> Result<Expr> {
		self.numeric_aggregate(AggregateFunc::Avg)
	}

	/// # Errors
	///
	/// Returns [`Error::TypeMismatch`] for non-numeric arguments.
	pub fn sum(self) -> Result<Expr> {
		self.numeric_aggregate(AggregateFunc::Sum)
	}

	fn numeric_aggregate(self, func: AggregateFunc) -> Result<Expr> {
		match self.semantic_type() {
			Some(ty) if !ty.is_numeric() => Err(Error::type_mismatch(
				func.as_str().to_lowercase(),
				SemanticType::Float,
				ty,
			)),
			_ => Ok(Expr::Aggregate(Aggregate::new(func, self, false))),
		}
	}

	pub fn asc(self) -> OrderSpecifier {
		OrderSpecifier::asc(self)
	}

	pub fn desc(self) -> OrderSpecifier {
		OrderSpecifier::desc(self)
	}
}

/// Reject operands whose types cannot be compared, and `NULL` literals.
pub(crate) fn check_operand(context: &str, left: &Expr, right: &Expr) -> Result<()> {
	for side in [left, right] {
		if matches!(side, Expr::Literal(Value::Null)) {
			return Err(Error::InvalidArgument(format!(
				"{} with a NULL operand never matches; use is_null()",
				context
			)));
		}
	}
	check_types(context, left.semantic_type(), right.semantic_type())
}

fn check_types(context: &str, left: Option<SemanticType>, right: Option<SemanticType>) -> Result<()> {
	match (left, right) {
		(Some(l), Some(r)) if !l.is_comparable_with(r) => Err(Error::type_mismatch(context, l, r)),
		_ => Ok(()),
	}
}

impl From<Value> for Expr {
	fn from(value: Value) -> Self {
		Expr::Literal(value)
	}
}

impl From<&Expr> for Expr {
	fn from(expr: &Expr) -> Self {
		expr.clone()
	}
}

impl<T: SqlType> From<TypedExpr<T>> for Expr {
	fn from(expr: TypedExpr<T>) -> Self {
		expr.into_expr()
	}
}

impl<T: SqlType> From<&TypedExpr<T>> for Expr {
	fn from(expr: &TypedExpr<T>) -> Self {
		expr.expr().clone()
	}
}

macro_rules! literal_from {
	($($ty:ty),* $(,)?) => {
		$(
			impl From<$ty> for Expr {
				fn from(value: $ty) -> Self {
					Expr::Literal(Value::from(value))
				}
			}
		)*
	};
}

literal_from!(bool, i32, i64, f64, String, &str);

/// One item of a select list.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
	Expr(Expr),
	/// Every column of an aliased entity, materialized as an entity instance.
	Entity(EntityPath),
}

impl Projection {
	pub fn as_expr(&self) -> Option<&Expr> {
		match self {
			Projection::Expr(expr) => Some(expr),
			Projection::Entity(_) => None,
		}
	}
}

impl From<Expr> for Projection {
	fn from(expr: Expr) -> Self {
		Projection::Expr(expr)
	}
}

impl From<&Expr> for Projection {
	fn from(expr: &Expr) -> Self {
		Projection::Expr(expr.clone())
	}
}

impl From<EntityPath> for Projection {
	fn from(entity: EntityPath) -> Self {
		Projection::Entity(entity)
	}
}

impl From<&EntityPath> for Projection {
	fn from(entity: &EntityPath) -> Self {
		Projection::Entity(entity.clone())
	}
}

impl<T: SqlType> From<TypedExpr<T>> for Projection {
	fn from(expr: TypedExpr<T>) -> Self {
		Projection::Expr(expr.into_expr())
	}
}

impl<T: SqlType> From<&TypedExpr<T>> for Projection {
	fn from(expr: &TypedExpr<T>) -> Self {
		Projection::Expr(expr.expr().clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_fixtures::registry;
	use rstest::rstest;

	#[rstest]
	fn test_eq_rejects_text_against_integer() {
		let member = registry().entity("Member", "member").unwrap();
		let err = member.field("age").unwrap().eq("thirty").unwrap_err();
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
	fn test_numeric_family_is_comparable() {
		let member = registry().entity("Member", "member").unwrap();
		assert!(member.field("age").unwrap().goe(29.5).is_ok());
	}

	#[rstest]
	fn test_null_operand_is_invalid() {
		let member = registry().entity("Member", "member").unwrap();
		let err = member.field("user_name").unwrap().eq(Value::Null).unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));
	}

	#[rstest]
	fn test_between_does_not_check_range_order() {
		let member = registry().entity("Member", "member").unwrap();
		let predicate = member.field("age").unwrap().between(30, 20);
		assert!(predicate.is_ok());
	}

	#[rstest]
	#[case::count(AggregateFunc::Count, SemanticType::Integer)]
	#[case::max(AggregateFunc::Max, SemanticType::Integer)]
	#[case::avg(AggregateFunc::Avg, SemanticType::Float)]
	fn test_aggregate_types(#[case] func: AggregateFunc, #[case] expected: SemanticType) {
		let member = registry().entity("Member", "member").unwrap();
		let age = member.field("age").unwrap();
		let aggregate = Expr::Aggregate(Aggregate::new(func, age, false));
		assert_eq!(aggregate.semantic_type(), Some(expected));
	}

	#[rstest]
	fn test_avg_of_text_is_type_mismatch() {
		let member = registry().entity("Member", "member").unwrap();
		let err = member.field("user_name").unwrap().avg().unwrap_err();
		assert!(matches!(err, Error::TypeMismatch { .. }));
	}
}
