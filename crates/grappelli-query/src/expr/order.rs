//! Ordering specifiers.

use super::Expr;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
	Asc,
	Desc,
}

impl Order {
	pub fn as_str(self) -> &'static str {
		match self {
			Order::Asc => "ASC",
			Order::Desc => "DESC",
		}
	}
}

/// Explicit placement of `NULL`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullOrdering {
	First,
	Last,
}

impl NullOrdering {
	pub fn as_str(self) -> &'static str {
		match self {
			NullOrdering::First => "NULLS FIRST",
			NullOrdering::Last => "NULLS LAST",
		}
	}
}

/// One `ORDER BY` item.
///
/// Without a null-ordering modifier the store decides where `NULL`s go.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpecifier {
	expr: Expr,
	order: Order,
	nulls: Option<NullOrdering>,
}

impl OrderSpecifier {
	pub fn new(expr: Expr, order: Order) -> Self {
		Self {
			expr,
			order,
			nulls: None,
		}
	}

	pub fn asc(expr: Expr) -> Self {
		Self::new(expr, Order::Asc)
	}

	pub fn desc(expr: Expr) -> Self {
		Self::new(expr, Order::Desc)
	}

	pub fn nulls_first(mut self) -> Self {
		self.nulls = Some(NullOrdering::First);
		self
	}

	pub fn nulls_last(mut self) -> Self {
		self.nulls = Some(NullOrdering::Last);
		self
	}

	pub fn expr(&self) -> &Expr {
		&self.expr
	}

	pub fn order(&self) -> Order {
		self.order
	}

	pub fn nulls(&self) -> Option<NullOrdering> {
		self.nulls
	}
}
