//! Boolean predicates.

use std::ops::Not;

use grappelli_core::Result;

use super::Expr;
use super::expression::check_operand;
use crate::plan::QueryPlan;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
	/// Equal (=)
	Eq,
	/// Not equal (<>)
	Ne,
	/// Greater than (>)
	Gt,
	/// Greater than or equal (>=)
	Goe,
	/// Less than (<)
	Lt,
	/// Less than or equal (<=)
	Loe,
}

impl CompareOp {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Eq => "=",
			Self::Ne => "<>",
			Self::Gt => ">",
			Self::Goe => ">=",
			Self::Lt => "<",
			Self::Loe => "<=",
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::Eq => "eq",
			Self::Ne => "ne",
			Self::Gt => "gt",
			Self::Goe => "goe",
			Self::Lt => "lt",
			Self::Loe => "loe",
		}
	}
}

/// Right-hand side of an `IN` predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum InList {
	Values(Vec<Expr>),
	SubQuery(Box<QueryPlan>),
}

/// A boolean condition.
///
/// Composite predicates are built explicitly with [`and`](Predicate::and),
/// [`or`](Predicate::or) and `!`; each composite renders parenthesized, so
/// the tree shape is the evaluation order.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
	Compare {
		left: Expr,
		op: CompareOp,
		right: Expr,
	},
	Between {
		expr: Expr,
		low: Expr,
		high: Expr,
	},
	In {
		expr: Expr,
		list: InList,
		negated: bool,
	},
	IsNull {
		expr: Expr,
		negated: bool,
	},
	Exists {
		plan: Box<QueryPlan>,
		negated: bool,
	},
	And(Vec<Predicate>),
	Or(Vec<Predicate>),
	Not(Box<Predicate>),
}

impl Predicate {
	/// Build a comparison after checking both operand types.
	pub fn compare_checked(left: Expr, op: CompareOp, right: Expr) -> Result<Self> {
		check_operand(op.name(), &left, &right)?;
		Ok(Self::compare_unchecked(left, op, right))
	}

	pub(crate) fn compare_unchecked(left: Expr, op: CompareOp, right: Expr) -> Self {
		Predicate::Compare { left, op, right }
	}

	/// `EXISTS (plan)`.
	pub fn exists(plan: QueryPlan) -> Self {
		Predicate::Exists {
			plan: Box::new(plan),
			negated: false,
		}
	}

	/// `NOT EXISTS (plan)`.
	pub fn not_exists(plan: QueryPlan) -> Self {
		Predicate::Exists {
			plan: Box::new(plan),
			negated: true,
		}
	}

	/// `self AND other`. Nested conjunctions are flattened.
	pub fn and(self, other: Predicate) -> Self {
		match (self, other) {
			(Predicate::And(mut left), Predicate::And(right)) => {
				left.extend(right);
				Predicate::And(left)
			}
			(Predicate::And(mut left), other) => {
				left.push(other);
				Predicate::And(left)
			}
			(this, other) => Predicate::And(vec![this, other]),
		}
	}

	/// `self OR other`. Nested disjunctions are flattened.
	pub fn or(self, other: Predicate) -> Self {
		match (self, other) {
			(Predicate::Or(mut left), Predicate::Or(right)) => {
				left.extend(right);
				Predicate::Or(left)
			}
			(Predicate::Or(mut left), other) => {
				left.push(other);
				Predicate::Or(left)
			}
			(this, other) => Predicate::Or(vec![this, other]),
		}
	}

	/// Conjunction of every predicate, `None` when there is none.
	pub fn all<I>(predicates: I) -> Option<Self>
	where
		I: IntoIterator<Item = Predicate>,
	{
		predicates.into_iter().reduce(Predicate::and)
	}

	/// Disjunction of every predicate, `None` when there is none.
	pub fn any<I>(predicates: I) -> Option<Self>
	where
		I: IntoIterator<Item = Predicate>,
	{
		predicates.into_iter().reduce(Predicate::or)
	}

	/// Visit every expression of this predicate, subqueries excluded.
	pub fn for_each_expr<F>(&self, f: &mut F)
	where
		F: FnMut(&Expr),
	{
		match self {
			Predicate::Compare { left, right, .. } => {
				f(left);
				f(right);
			}
			Predicate::Between { expr, low, high } => {
				f(expr);
				f(low);
				f(high);
			}
			Predicate::In { expr, list, .. } => {
				f(expr);
				if let InList::Values(values) = list {
					values.iter().for_each(&mut *f);
				}
			}
			Predicate::IsNull { expr, .. } => f(expr),
			Predicate::Exists { .. } => {}
			Predicate::And(items) | Predicate::Or(items) => {
				for item in items {
					item.for_each_expr(f);
				}
			}
			Predicate::Not(inner) => inner.for_each_expr(f),
		}
	}
}

impl Not for Predicate {
	type Output = Predicate;

	fn not(self) -> Self::Output {
		match self {
			Predicate::Not(inner) => *inner,
			other => Predicate::Not(Box::new(other)),
		}
	}
}
