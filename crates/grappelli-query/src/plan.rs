//! Query plans
//!
//! A [`QueryPlan`] is a plain value describing a query before compilation:
//! projections, sources, joins, filters, grouping, ordering and paging. Every
//! builder method consumes the plan and returns the updated one, so a plan
//! already handed to the compiler (by reference) is never mutated.
//!
//! # Examples
//!
//! ```rust,ignore
//! let member = registry.entity("Member", "member")?;
//! let team = registry.entity("Team", "team")?;
//! let age = member.column::<i32>("age")?;
//!
//! let plan = select((team.column::<String>("name")?, age.avg()))
//!     .from(&member)
//!     .inner_join(&member.association("team")?, &team)
//!     .group_by(team.field("name")?)
//!     .order_by(team.field("name")?.asc());
//! ```

use grappelli_core::{Error, Result, SemanticType, SqlType};

use crate::expr::{AssociationPath, EntityPath, Expr, OrderSpecifier, Predicate, Projection, TypedExpr};

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
	Inner,
	Left,
}

impl JoinKind {
	pub fn as_str(self) -> &'static str {
		match self {
			JoinKind::Inner => "INNER JOIN",
			JoinKind::Left => "LEFT JOIN",
		}
	}
}

/// One join of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
	kind: JoinKind,
	target: EntityPath,
	association: Option<AssociationPath>,
	on: Option<Predicate>,
	fetch: bool,
}

impl JoinSpec {
	pub fn kind(&self) -> JoinKind {
		self.kind
	}

	/// Alias introduced by the join.
	pub fn target(&self) -> &EntityPath {
		&self.target
	}

	/// Association the join follows; `None` for a theta join.
	pub fn association(&self) -> Option<&AssociationPath> {
		self.association.as_ref()
	}

	/// Extra condition ANDed into the join condition.
	pub fn on_predicate(&self) -> Option<&Predicate> {
		self.on.as_ref()
	}

	pub fn is_fetch(&self) -> bool {
		self.fetch
	}

	pub fn is_theta(&self) -> bool {
		self.association.is_none()
	}
}

/// Immutable description of a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPlan {
	projections: Vec<Projection>,
	sources: Vec<EntityPath>,
	joins: Vec<JoinSpec>,
	predicates: Vec<Predicate>,
	group_by: Vec<Expr>,
	having: Vec<Predicate>,
	order_by: Vec<OrderSpecifier>,
	offset: Option<u64>,
	limit: Option<u64>,
	distinct: bool,
}

impl QueryPlan {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace the select list.
	pub fn select(mut self, projections: impl IntoProjections) -> Self {
		self.projections = projections.into_projections();
		self
	}

	/// Add sources. Sources without a join between them are cross-joined.
	pub fn from(mut self, sources: impl IntoSources) -> Self {
		self.sources.extend(sources.into_sources());
		self
	}

	/// Join `alias` through `association`.
	pub fn join(mut self, kind: JoinKind, association: &AssociationPath, alias: &EntityPath) -> Self {
		self.joins.push(JoinSpec {
			kind,
			target: alias.clone(),
			association: Some(association.clone()),
			on: None,
			fetch: false,
		});
		self
	}

	pub fn inner_join(self, association: &AssociationPath, alias: &EntityPath) -> Self {
		self.join(JoinKind::Inner, association, alias)
	}

	pub fn left_join(self, association: &AssociationPath, alias: &EntityPath) -> Self {
		self.join(JoinKind::Left, association, alias)
	}

	/// Join an alias without relationship metadata; the following
	/// [`on`](Self::on) predicate is the whole join condition.
	pub fn join_unrelated(mut self, kind: JoinKind, alias: &EntityPath) -> Self {
		self.joins.push(JoinSpec {
			kind,
			target: alias.clone(),
			association: None,
			on: None,
			fetch: false,
		});
		self
	}

	pub fn theta_join(self, alias: &EntityPath) -> Self {
		self.join_unrelated(JoinKind::Inner, alias)
	}

	pub fn left_theta_join(self, alias: &EntityPath) -> Self {
		self.join_unrelated(JoinKind::Left, alias)
	}

	/// AND `predicate` into the condition of the most recent join.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidPlan`] when the plan has no join yet.
	pub fn on(mut self, predicate: Predicate) -> Result<Self> {
		let join = self.last_join("on")?;
		join.on = Some(match join.on.take() {
			Some(existing) => existing.and(predicate),
			None => predicate,
		});
		Ok(self)
	}

	/// Mark the most recent join as eager. A fetch join cannot carry an
	/// [`on`](Self::on) condition; the compiler rejects the plan.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidPlan`] when the plan has no join yet.
	pub fn fetch_join(mut self) -> Result<Self> {
		self.last_join("fetch_join")?.fetch = true;
		Ok(self)
	}

	fn last_join(&mut self, operation: &str) -> Result<&mut JoinSpec> {
		self.joins
			.last_mut()
			.ok_or_else(|| Error::InvalidPlan(format!("{} requires a preceding join", operation)))
	}

	/// Add a `where` condition; conditions are AND-combined. `None` is
	/// ignored, which keeps dynamic filters readable.
	pub fn filter(mut self, predicate: impl Into<Option<Predicate>>) -> Self {
		if let Some(predicate) = predicate.into() {
			self.predicates.push(predicate);
		}
		self
	}

	pub fn filter_all<I>(mut self, predicates: I) -> Self
	where
		I: IntoIterator<Item = Predicate>,
	{
		self.predicates.extend(predicates);
		self
	}

	pub fn group_by(mut self, expr: impl Into<Expr>) -> Self {
		self.group_by.push(expr.into());
		self
	}

	pub fn having(mut self, predicate: Predicate) -> Self {
		self.having.push(predicate);
		self
	}

	pub fn order_by(mut self, specifier: OrderSpecifier) -> Self {
		self.order_by.push(specifier);
		self
	}

	pub fn distinct(mut self) -> Self {
		self.distinct = true;
		self
	}

	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] when `offset` is negative.
	pub fn offset(mut self, offset: i64) -> Result<Self> {
		self.offset = Some(non_negative("offset", offset)?);
		Ok(self)
	}

	/// `limit(0)` yields no rows.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] when `limit` is negative.
	pub fn limit(mut self, limit: i64) -> Result<Self> {
		self.limit = Some(non_negative("limit", limit)?);
		Ok(self)
	}

	/// Same plan without offset and limit.
	pub fn unpaged(mut self) -> Self {
		self.offset = None;
		self.limit = None;
		self
	}

	pub fn projections(&self) -> &[Projection] {
		&self.projections
	}

	pub fn sources(&self) -> &[EntityPath] {
		&self.sources
	}

	pub fn joins(&self) -> &[JoinSpec] {
		&self.joins
	}

	pub fn predicates(&self) -> &[Predicate] {
		&self.predicates
	}

	pub fn group_by_exprs(&self) -> &[Expr] {
		&self.group_by
	}

	pub fn having_predicates(&self) -> &[Predicate] {
		&self.having
	}

	pub fn order_specifiers(&self) -> &[OrderSpecifier] {
		&self.order_by
	}

	pub fn offset_value(&self) -> Option<u64> {
		self.offset
	}

	pub fn limit_value(&self) -> Option<u64> {
		self.limit
	}

	pub fn is_distinct(&self) -> bool {
		self.distinct
	}

	/// Type of the single scalar this plan yields when used as a subquery.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidPlan`] unless exactly one scalar expression is
	/// projected.
	pub fn scalar_type(&self) -> Result<Option<SemanticType>> {
		match self.projections.as_slice() {
			[Projection::Expr(expr)] => Ok(expr.semantic_type()),
			_ => Err(Error::InvalidPlan(
				"a subquery must project exactly one scalar expression".to_string(),
			)),
		}
	}

	/// Use the plan as a typed scalar subquery.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidPlan`] as [`scalar_type`](Self::scalar_type)
	/// does, and [`Error::TypeMismatch`] when the projected type cannot be
	/// compared with `T`.
	pub fn as_scalar<T: SqlType>(self) -> Result<TypedExpr<T>> {
		if let Some(actual) = self.scalar_type()?
			&& !actual.is_comparable_with(T::SEMANTIC)
		{
			return Err(Error::type_mismatch("subquery", T::SEMANTIC, actual));
		}
		Ok(TypedExpr::from_expr(Expr::SubQuery(Box::new(self))))
	}
}

fn non_negative(name: &str, value: i64) -> Result<u64> {
	u64::try_from(value)
		.map_err(|_| Error::InvalidArgument(format!("{} must not be negative, got {}", name, value)))
}

/// Start a plan with a select list.
pub fn select(projections: impl IntoProjections) -> QueryPlan {
	QueryPlan::new().select(projections)
}

/// `select(entity).from(entity)`.
pub fn select_from(entity: &EntityPath) -> QueryPlan {
	QueryPlan::new().select(entity).from(entity)
}

/// Anything usable as a select list: one projection or a tuple of them.
pub trait IntoProjections {
	fn into_projections(self) -> Vec<Projection>;
}

macro_rules! single_projection {
	($($ty:ty),* $(,)?) => {
		$(
			impl IntoProjections for $ty {
				fn into_projections(self) -> Vec<Projection> {
					vec![Projection::from(self)]
				}
			}
		)*
	};
}

single_projection!(Projection, Expr, &Expr, EntityPath, &EntityPath);

impl<T: SqlType> IntoProjections for TypedExpr<T> {
	fn into_projections(self) -> Vec<Projection> {
		vec![Projection::from(self)]
	}
}

impl<T: SqlType> IntoProjections for &TypedExpr<T> {
	fn into_projections(self) -> Vec<Projection> {
		vec![Projection::from(self)]
	}
}

impl IntoProjections for Vec<Projection> {
	fn into_projections(self) -> Vec<Projection> {
		self
	}
}

macro_rules! tuple_projections {
	($($name:ident),+) => {
		impl<$($name: Into<Projection>),+> IntoProjections for ($($name,)+) {
			#[allow(non_snake_case)]
			fn into_projections(self) -> Vec<Projection> {
				let ($($name,)+) = self;
				vec![$($name.into()),+]
			}
		}
	};
}

tuple_projections!(A, B);
tuple_projections!(A, B, C);
tuple_projections!(A, B, C, D);
tuple_projections!(A, B, C, D, E);
tuple_projections!(A, B, C, D, E, F);

/// Anything usable as the source list of `from`.
pub trait IntoSources {
	fn into_sources(self) -> Vec<EntityPath>;
}

impl IntoSources for EntityPath {
	fn into_sources(self) -> Vec<EntityPath> {
		vec![self]
	}
}

impl IntoSources for &EntityPath {
	fn into_sources(self) -> Vec<EntityPath> {
		vec![self.clone()]
	}
}

impl IntoSources for Vec<EntityPath> {
	fn into_sources(self) -> Vec<EntityPath> {
		self
	}
}

macro_rules! tuple_sources {
	($($name:ident),+) => {
		impl<$($name: Into<EntityPath>),+> IntoSources for ($($name,)+) {
			#[allow(non_snake_case)]
			fn into_sources(self) -> Vec<EntityPath> {
				let ($($name,)+) = self;
				vec![$($name.into()),+]
			}
		}
	};
}

tuple_sources!(A, B);
tuple_sources!(A, B, C);
tuple_sources!(A, B, C, D);
