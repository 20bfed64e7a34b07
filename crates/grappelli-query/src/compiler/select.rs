//! `SELECT` and count compilation.

use std::collections::HashSet;
use std::sync::Arc;

use grappelli_core::{Error, Result, Value};
use indexmap::IndexMap;
use tracing::trace;

use super::{
	CompiledQuery, CompiledStatement, Dialect, DialectKind, FetchBinding, ItemKind, LayoutItem,
	ResultLayout, ResultShape, SqlWriter,
};
use crate::expr::{Expr, InList, NullOrdering, Order, OrderSpecifier, PathExpr, Predicate, Projection};
use crate::metadata::{AssociationMetadata, Cardinality, EntityMetadata, MetadataRegistry};
use crate::plan::{JoinKind, JoinSpec, QueryPlan};

const COUNT_ALIAS: &str = "grappelli_count";

/// Compiles plans for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct SelectCompiler {
	dialect: &'static dyn Dialect,
}

impl SelectCompiler {
	pub fn new(dialect: &'static dyn Dialect) -> Self {
		Self { dialect }
	}

	pub fn for_kind(kind: DialectKind) -> Self {
		Self::new(kind.dialect())
	}

	pub fn dialect(&self) -> &'static dyn Dialect {
		self.dialect
	}

	/// Compile a plan into a `SELECT` and its row layout.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidPlan`] when the plan cannot be rendered.
	pub fn compile(&self, plan: &QueryPlan) -> Result<CompiledQuery> {
		let mut renderer = Renderer::new(self.dialect);
		let layout = renderer.select(plan, Mode::Root)?;
		let (sql, params) = renderer.writer.finish();
		trace!(dialect = %self.dialect.kind(), sql = %sql, params = params.len(), "compiled query");
		Ok(CompiledQuery {
			statement: CompiledStatement::new(sql, params),
			layout,
		})
	}

	/// Compile the count-shaped rewrite of a plan: same sources, joins and
	/// filters, without ordering or paging.
	///
	/// Plans whose row count depends on the select list (grouping,
	/// `distinct`, aggregates) are counted through a derived table.
	pub fn compile_count(&self, plan: &QueryPlan) -> Result<CompiledStatement> {
		let mut renderer = Renderer::new(self.dialect);
		if needs_derived_count(plan) {
			renderer.writer.push("SELECT COUNT(*) FROM (");
			renderer.select(plan, Mode::CountWrapped)?;
			renderer.writer.push(") AS ");
			renderer.ident(COUNT_ALIAS);
		} else {
			renderer.plain_count(plan)?;
		}
		let (sql, params) = renderer.writer.finish();
		trace!(dialect = %self.dialect.kind(), sql = %sql, params = params.len(), "compiled count");
		Ok(CompiledStatement::new(sql, params))
	}
}

fn needs_derived_count(plan: &QueryPlan) -> bool {
	plan.is_distinct()
		|| !plan.group_by_exprs().is_empty()
		|| !plan.having_predicates().is_empty()
		|| has_aggregate_projection(plan)
}

fn has_aggregate_projection(plan: &QueryPlan) -> bool {
	plan.projections()
		.iter()
		.any(|p| p.as_expr().is_some_and(Expr::is_aggregate))
}

fn invalid(message: impl Into<String>) -> Error {
	Error::InvalidPlan(message.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
	/// Top-level query: fetch columns are appended.
	Root,
	/// Select list of a derived count table: columns are aliased, no
	/// ordering or paging.
	CountWrapped,
	/// Scalar or `IN` subquery.
	Subquery,
	/// `EXISTS` subquery: an empty select list renders as `SELECT 1`.
	Exists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
	Select,
	Where,
	On,
	GroupBy,
	Having,
	OrderBy,
}

impl Clause {
	fn allows_aggregates(self) -> bool {
		matches!(self, Clause::Select | Clause::Having | Clause::OrderBy)
	}

	fn as_str(self) -> &'static str {
		match self {
			Clause::Select => "select",
			Clause::Where => "where",
			Clause::On => "on",
			Clause::GroupBy => "group by",
			Clause::Having => "having",
			Clause::OrderBy => "order by",
		}
	}
}

/// A join generated for a path hop no explicit join covers.
#[derive(Debug)]
struct ImplicitJoin {
	owner_alias: String,
	association: AssociationMetadata,
	alias: String,
}

/// Aliases visible while one plan is rendered.
#[derive(Debug)]
struct Scope {
	aliases: IndexMap<String, Arc<EntityMetadata>>,
	/// `(owner alias, association)` to the alias reached through it.
	hops: IndexMap<(String, String), String>,
	implicit: Vec<ImplicitJoin>,
}

struct Renderer<'a> {
	dialect: &'a dyn Dialect,
	writer: SqlWriter,
	scopes: Vec<Scope>,
}

impl<'a> Renderer<'a> {
	fn new(dialect: &'a dyn Dialect) -> Self {
		Self {
			dialect,
			writer: SqlWriter::new(),
			scopes: Vec::new(),
		}
	}

	fn ident(&mut self, name: &str) {
		let dialect = self.dialect;
		self.writer.push_identifier(name, |s| dialect.escape_identifier(s));
	}

	fn column(&mut self, alias: &str, column: &str) {
		self.ident(alias);
		self.writer.push(".");
		self.ident(column);
	}

	fn value(&mut self, value: Value) {
		let dialect = self.dialect;
		self.writer.push_value(value, |i| dialect.placeholder(i));
	}

	fn is_declared(&self, alias: &str) -> bool {
		self.scopes.iter().any(|s| s.aliases.contains_key(alias))
	}

	fn current(&self) -> Result<&Scope> {
		self.scopes.last().ok_or_else(|| invalid("no alias scope is open"))
	}

	// Scope construction

	fn open_scope(&mut self, plan: &QueryPlan) -> Result<()> {
		let Some(first) = plan.sources().first() else {
			return Err(invalid("a query needs at least one source"));
		};
		let registry = Arc::clone(first.registry());
		let mut scope = Scope {
			aliases: IndexMap::new(),
			hops: IndexMap::new(),
			implicit: Vec::new(),
		};

		for source in plan.sources() {
			self.declare(&mut scope, source.alias(), Arc::clone(source.metadata()))?;
		}
		for join in plan.joins() {
			self.declare_join(&mut scope, join)?;
		}

		let mut paths: Vec<(PathExpr, bool)> = Vec::new();
		{
			let mut collect = |expr: &Expr, in_join: bool| collect_paths(expr, in_join, &mut paths);
			for projection in plan.projections() {
				if let Projection::Expr(expr) = projection {
					collect(expr, false);
				}
			}
			for join in plan.joins() {
				if let Some(on) = join.on_predicate() {
					on.for_each_expr(&mut |e: &Expr| collect(e, true));
				}
			}
			for predicate in plan.predicates().iter().chain(plan.having_predicates()) {
				predicate.for_each_expr(&mut |e: &Expr| collect(e, false));
			}
			for expr in plan.group_by_exprs() {
				collect(expr, false);
			}
			for specifier in plan.order_specifiers() {
				collect(specifier.expr(), false);
			}
		}
		for (path, in_join) in &paths {
			self.plan_hops(&mut scope, &registry, path, *in_join)?;
		}

		self.scopes.push(scope);
		Ok(())
	}

	fn declare(&self, scope: &mut Scope, alias: &str, metadata: Arc<EntityMetadata>) -> Result<()> {
		if scope.aliases.contains_key(alias) || self.is_declared(alias) {
			return Err(invalid(format!("alias {} is declared more than once", alias)));
		}
		scope.aliases.insert(alias.to_string(), metadata);
		Ok(())
	}

	fn declare_join(&self, scope: &mut Scope, join: &JoinSpec) -> Result<()> {
		let target = join.target();
		match join.association() {
			Some(association) => {
				if association.hops().len() != 1 {
					return Err(invalid(format!(
						"join to {} must follow a single association",
						target.alias()
					)));
				}
				let owner = association.owner().alias();
				if !scope.aliases.contains_key(owner) {
					return Err(invalid(format!(
						"join to {} navigates from {}, which is not declared before it",
						target.alias(),
						owner
					)));
				}
				if association.target().name() != target.entity_name() {
					return Err(invalid(format!(
						"association {}.{} leads to {}, not {}",
						owner,
						association.association().name(),
						association.target().name(),
						target.entity_name()
					)));
				}
				self.declare(scope, target.alias(), Arc::clone(target.metadata()))?;
				scope.hops.insert(
					(owner.to_string(), association.association().name().to_string()),
					target.alias().to_string(),
				);
			}
			None => {
				if join.kind() == JoinKind::Left && join.on_predicate().is_none() {
					return Err(invalid(format!(
						"left theta join to {} needs an on condition",
						target.alias()
					)));
				}
				self.declare(scope, target.alias(), Arc::clone(target.metadata()))?;
			}
		}
		Ok(())
	}

	/// Create implicit joins for the hops of `path` no explicit join covers.
	fn plan_hops(
		&self,
		scope: &mut Scope,
		registry: &MetadataRegistry,
		path: &PathExpr,
		in_join_condition: bool,
	) -> Result<()> {
		if path.hops().is_empty() {
			return Ok(());
		}
		if !scope.aliases.contains_key(path.root()) {
			return Err(if self.is_declared(path.root()) {
				invalid(format!(
					"{} navigates from the enclosing query's alias; join it explicitly",
					path
				))
			} else {
				invalid(format!("unknown alias {} in {}", path.root(), path))
			});
		}

		let mut current = path.root().to_string();
		for hop in path.hops() {
			let key = (current.clone(), hop.name().to_string());
			if let Some(next) = scope.hops.get(&key) {
				current = next.clone();
				continue;
			}
			if in_join_condition {
				return Err(invalid(format!(
					"{} in a join condition needs an explicit join for {}",
					path,
					hop.name()
				)));
			}
			if hop.cardinality() == Cardinality::Many {
				return Err(invalid(format!(
					"{} traverses the to-many association {}; use an explicit join",
					path,
					hop.name()
				)));
			}
			let alias = self.unique_alias(scope, &format!("{}_{}", current, hop.name()));
			let target = registry.describe(hop.target())?;
			trace!(path = %path, alias = %alias, "implicit join");
			scope.aliases.insert(alias.clone(), target);
			scope.hops.insert(key, alias.clone());
			scope.implicit.push(ImplicitJoin {
				owner_alias: current,
				association: hop.clone(),
				alias: alias.clone(),
			});
			current = alias;
		}
		Ok(())
	}

	fn unique_alias(&self, scope: &Scope, base: &str) -> String {
		let taken = |alias: &str| scope.aliases.contains_key(alias) || self.is_declared(alias);
		if !taken(base) {
			return base.to_string();
		}
		let mut n = 1;
		loop {
			let candidate = format!("{}_{}", base, n);
			if !taken(&candidate) {
				return candidate;
			}
			n += 1;
		}
	}

	/// Alias owning the column a path points at.
	fn resolve(&self, path: &PathExpr) -> Result<String> {
		let scope = self
			.scopes
			.iter()
			.rev()
			.find(|s| s.aliases.contains_key(path.root()))
			.ok_or_else(|| invalid(format!("unknown alias {} in {}", path.root(), path)))?;
		if let Some(metadata) = scope.aliases.get(path.root())
			&& metadata.name() != path.root_entity()
		{
			return Err(invalid(format!(
				"alias {} stands for {}, not {}",
				path.root(),
				metadata.name(),
				path.root_entity()
			)));
		}
		let mut alias = path.root().to_string();
		for hop in path.hops() {
			alias = scope
				.hops
				.get(&(alias.clone(), hop.name().to_string()))
				.cloned()
				.ok_or_else(|| invalid(format!("no join covers {}", path)))?;
		}
		Ok(alias)
	}

	// Validation

	fn check_projections(&self, plan: &QueryPlan, mode: Mode) -> Result<()> {
		if plan.projections().is_empty() && mode != Mode::Exists {
			return Err(invalid("a query needs at least one projection"));
		}
		let scope = self.current()?;
		for projection in plan.projections() {
			if let Projection::Entity(entity) = projection
				&& !scope.aliases.contains_key(entity.alias())
			{
				return Err(invalid(format!(
					"projected alias {} is not a source of the query",
					entity.alias()
				)));
			}
		}
		Ok(())
	}

	fn check_grouping(&self, plan: &QueryPlan) -> Result<()> {
		let group_by = plan.group_by_exprs();
		if !has_aggregate_projection(plan) && group_by.is_empty() {
			return Ok(());
		}
		for projection in plan.projections() {
			match projection {
				Projection::Expr(expr @ Expr::Path(path)) if !group_by.contains(expr) => {
					return Err(invalid(format!(
						"{} must appear in group_by or be aggregated",
						path
					)));
				}
				Projection::Entity(entity) if !group_by.contains(&entity.id()) => {
					return Err(invalid(format!(
						"entity {} is projected in a grouped query without grouping by its id",
						entity.alias()
					)));
				}
				_ => {}
			}
		}
		if plan.joins().iter().any(JoinSpec::is_fetch) {
			return Err(invalid("fetch joins cannot be combined with grouping"));
		}
		Ok(())
	}

	/// Validate fetch joins and compute their bindings; `offset` is the first
	/// hidden column.
	fn fetch_bindings(&self, plan: &QueryPlan, mode: Mode, mut offset: usize) -> Result<Vec<FetchBinding>> {
		let fetches: Vec<&JoinSpec> = plan.joins().iter().filter(|j| j.is_fetch()).collect();
		if fetches.is_empty() {
			return Ok(Vec::new());
		}
		if matches!(mode, Mode::Subquery | Mode::Exists) {
			return Err(invalid("fetch joins are not allowed in subqueries"));
		}
		let mut owners: HashSet<&str> = plan
			.projections()
			.iter()
			.filter_map(|p| match p {
				Projection::Entity(entity) => Some(entity.alias()),
				Projection::Expr(_) => None,
			})
			.collect();
		let mut bindings = Vec::with_capacity(fetches.len());
		for join in fetches {
			let target = join.target();
			let association = join
				.association()
				.ok_or_else(|| invalid(format!("fetch join to {} has no association", target.alias())))?;
			if join.on_predicate().is_some() {
				return Err(invalid(format!(
					"fetch join to {} cannot carry an on condition",
					target.alias()
				)));
			}
			let owner = association.owner().alias();
			if !owners.contains(owner) {
				return Err(invalid(format!(
					"fetch join to {} hangs off {}, which is neither a projected entity nor a fetched one",
					target.alias(),
					owner
				)));
			}
			owners.insert(target.alias());
			bindings.push(FetchBinding {
				owner_alias: owner.to_string(),
				association: association.association().clone(),
				target_alias: target.alias().to_string(),
				target: Arc::clone(target.metadata()),
				offset,
			});
			offset += target.metadata().column_count();
		}
		Ok(bindings)
	}

	// Rendering

	fn select(&mut self, plan: &QueryPlan, mode: Mode) -> Result<ResultLayout> {
		self.open_scope(plan)?;
		self.check_projections(plan, mode)?;
		self.check_grouping(plan)?;

		self.writer.push_keyword("SELECT");
		if plan.is_distinct() {
			self.writer.push_keyword("DISTINCT");
		}
		self.writer.push_space();

		let mut items = Vec::with_capacity(plan.projections().len());
		let mut width = 0;
		if plan.projections().is_empty() {
			self.writer.push("1");
		}
		for (i, projection) in plan.projections().iter().enumerate() {
			if i > 0 {
				self.writer.push_comma();
			}
			let kind = match projection {
				Projection::Expr(expr) => {
					self.expr(expr, Clause::Select)?;
					if mode == Mode::CountWrapped {
						self.column_alias(width);
					}
					ItemKind::Scalar(expr.semantic_type())
				}
				Projection::Entity(entity) => {
					let metadata = Arc::clone(entity.metadata());
					for (j, column) in metadata.selected_columns().into_iter().enumerate() {
						if j > 0 {
							self.writer.push_comma();
						}
						self.column(entity.alias(), column);
						if mode == Mode::CountWrapped {
							self.column_alias(width + j);
						}
					}
					ItemKind::Entity(metadata)
				}
			};
			let item = LayoutItem {
				projection: projection.clone(),
				offset: width,
				kind,
			};
			width += item.width();
			items.push(item);
		}

		let fetches = self.fetch_bindings(plan, mode, width)?;
		if mode == Mode::Root {
			for binding in &fetches {
				for column in binding.target.selected_columns() {
					self.writer.push_comma();
					self.column(&binding.target_alias, column);
				}
				width += binding.target.column_count();
			}
		}

		self.from_clause(plan)?;
		self.where_clause(plan.predicates())?;

		if !plan.group_by_exprs().is_empty() {
			self.writer.push_keyword("GROUP BY");
			self.writer.push_space();
			for (i, expr) in plan.group_by_exprs().iter().enumerate() {
				if i > 0 {
					self.writer.push_comma();
				}
				self.expr(expr, Clause::GroupBy)?;
			}
		}
		if !plan.having_predicates().is_empty() {
			self.writer.push_keyword("HAVING");
			self.writer.push_space();
			self.conjunction(plan.having_predicates(), Clause::Having)?;
		}

		if mode != Mode::CountWrapped {
			self.order_by(plan.order_specifiers())?;
			self.dialect
				.write_limit_offset(&mut self.writer, plan.limit_value(), plan.offset_value());
		}

		self.scopes.pop();

		let shape = match items.as_slice() {
			[item] if matches!(item.kind, ItemKind::Entity(_)) => ResultShape::Entity,
			[_] => ResultShape::Scalar,
			_ => ResultShape::Tuple,
		};
		Ok(ResultLayout {
			shape,
			items,
			fetches,
			width,
		})
	}

	fn plain_count(&mut self, plan: &QueryPlan) -> Result<()> {
		self.open_scope(plan)?;
		self.check_projections(plan, Mode::Root)?;
		self.fetch_bindings(plan, Mode::Root, 0)?;
		self.writer.push("SELECT COUNT(*)");
		self.from_clause(plan)?;
		self.where_clause(plan.predicates())?;
		self.scopes.pop();
		Ok(())
	}

	fn column_alias(&mut self, index: usize) {
		self.writer.push_keyword("AS");
		self.writer.push_space();
		self.ident(&format!("c{}", index));
	}

	fn table(&mut self, table: &str, alias: &str) {
		self.ident(table);
		self.writer.push(" AS ");
		self.ident(alias);
	}

	fn from_clause(&mut self, plan: &QueryPlan) -> Result<()> {
		self.writer.push_keyword("FROM");
		self.writer.push_space();
		for (i, source) in plan.sources().iter().enumerate() {
			if i > 0 {
				self.writer.push_keyword("CROSS JOIN");
				self.writer.push_space();
			}
			self.table(source.metadata().table(), source.alias());
		}

		for join in plan.joins() {
			let target = join.target();
			match (join.association(), join.on_predicate()) {
				(Some(association), on) => {
					self.writer.push_keyword(join.kind().as_str());
					self.writer.push_space();
					self.table(target.metadata().table(), target.alias());
					self.writer.push(" ON ");
					self.join_condition(
						association.owner().alias(),
						association.association(),
						target.alias(),
					);
					if let Some(on) = on {
						self.writer.push(" AND ");
						self.predicate(on, Clause::On)?;
					}
				}
				(None, Some(on)) => {
					self.writer.push_keyword(join.kind().as_str());
					self.writer.push_space();
					self.table(target.metadata().table(), target.alias());
					self.writer.push(" ON ");
					self.predicate(on, Clause::On)?;
				}
				(None, None) => {
					self.writer.push_keyword("CROSS JOIN");
					self.writer.push_space();
					self.table(target.metadata().table(), target.alias());
				}
			}
		}

		let implicit: Vec<(String, AssociationMetadata, String)> = self
			.current()?
			.implicit
			.iter()
			.map(|j| (j.owner_alias.clone(), j.association.clone(), j.alias.clone()))
			.collect();
		for (owner, association, alias) in implicit {
			self.writer.push_keyword(JoinKind::Inner.as_str());
			self.writer.push_space();
			self.table(association.target_table(), &alias);
			self.writer.push(" ON ");
			self.join_condition(&owner, &association, &alias);
		}
		Ok(())
	}

	fn join_condition(&mut self, owner: &str, association: &AssociationMetadata, target: &str) {
		self.column(owner, association.owner_column());
		self.writer.push(" = ");
		self.column(target, association.target_column());
	}

	fn where_clause(&mut self, predicates: &[Predicate]) -> Result<()> {
		if predicates.is_empty() {
			return Ok(());
		}
		self.writer.push_keyword("WHERE");
		self.writer.push_space();
		self.conjunction(predicates, Clause::Where)
	}

	fn conjunction(&mut self, predicates: &[Predicate], clause: Clause) -> Result<()> {
		for (i, predicate) in predicates.iter().enumerate() {
			if i > 0 {
				self.writer.push(" AND ");
			}
			self.predicate(predicate, clause)?;
		}
		Ok(())
	}

	fn order_by(&mut self, specifiers: &[OrderSpecifier]) -> Result<()> {
		if specifiers.is_empty() {
			return Ok(());
		}
		self.writer.push_keyword("ORDER BY");
		self.writer.push_space();
		for (i, specifier) in specifiers.iter().enumerate() {
			if i > 0 {
				self.writer.push_comma();
			}
			let native = self.dialect.supports_nulls_ordering();
			if let Some(nulls) = specifier.nulls()
				&& !native
			{
				// `expr IS NULL` sorts non-null rows (0) before null ones (1).
				self.expr(specifier.expr(), Clause::OrderBy)?;
				self.writer.push(" IS NULL");
				if nulls == NullOrdering::First {
					self.writer.push(" DESC");
				}
				self.writer.push_comma();
			}
			self.expr(specifier.expr(), Clause::OrderBy)?;
			self.writer.push(match specifier.order() {
				Order::Asc => " ASC",
				Order::Desc => " DESC",
			});
			if let Some(nulls) = specifier.nulls()
				&& native
			{
				self.writer.push(" ");
				self.writer.push(nulls.as_str());
			}
		}
		Ok(())
	}

	fn expr(&mut self, expr: &Expr, clause: Clause) -> Result<()> {
		match expr {
			Expr::Path(path) => {
				let alias = self.resolve(path)?;
				self.column(&alias, path.column());
			}
			Expr::Literal(value) => self.value(value.clone()),
			Expr::Aggregate(aggregate) => {
				if !clause.allows_aggregates() {
					return Err(invalid(format!(
						"aggregate {} is not allowed in {}",
						aggregate.func().as_str(),
						clause.as_str()
					)));
				}
				if aggregate.arg().is_aggregate() {
					return Err(invalid("aggregate functions cannot be nested"));
				}
				self.writer.push(aggregate.func().as_str());
				self.writer.push("(");
				if aggregate.is_distinct() {
					self.writer.push("DISTINCT ");
				}
				self.expr(aggregate.arg(), clause)?;
				self.writer.push(")");
			}
			Expr::SubQuery(plan) => self.subquery(plan, Mode::Subquery)?,
		}
		Ok(())
	}

	fn subquery(&mut self, plan: &QueryPlan, mode: Mode) -> Result<()> {
		self.writer.push("(");
		self.select(plan, mode)?;
		self.writer.push(")");
		Ok(())
	}

	fn predicate(&mut self, predicate: &Predicate, clause: Clause) -> Result<()> {
		match predicate {
			Predicate::Compare { left, op, right } => {
				self.expr(left, clause)?;
				self.writer.push(" ");
				self.writer.push(op.as_str());
				self.writer.push(" ");
				self.expr(right, clause)?;
			}
			Predicate::Between { expr, low, high } => {
				self.expr(expr, clause)?;
				self.writer.push(" BETWEEN ");
				self.expr(low, clause)?;
				self.writer.push(" AND ");
				self.expr(high, clause)?;
			}
			Predicate::In { expr, list, negated } => match list {
				// An empty list matches nothing, so NOT IN matches everything.
				InList::Values(values) if values.is_empty() => {
					self.writer.push(if *negated { "1 = 1" } else { "1 = 0" });
				}
				InList::Values(values) => {
					self.expr(expr, clause)?;
					self.writer.push(if *negated { " NOT IN (" } else { " IN (" });
					for (i, value) in values.iter().enumerate() {
						if i > 0 {
							self.writer.push_comma();
						}
						self.expr(value, clause)?;
					}
					self.writer.push(")");
				}
				InList::SubQuery(plan) => {
					self.expr(expr, clause)?;
					self.writer.push(if *negated { " NOT IN " } else { " IN " });
					self.subquery(plan, Mode::Subquery)?;
				}
			},
			Predicate::IsNull { expr, negated } => {
				self.expr(expr, clause)?;
				self.writer.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
			}
			Predicate::Exists { plan, negated } => {
				self.writer.push(if *negated { "NOT EXISTS " } else { "EXISTS " });
				self.subquery(plan, Mode::Exists)?;
			}
			Predicate::And(items) | Predicate::Or(items) => {
				let separator = if matches!(predicate, Predicate::And(_)) {
					" AND "
				} else {
					" OR "
				};
				self.writer.push("(");
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						self.writer.push(separator);
					}
					self.predicate(item, clause)?;
				}
				self.writer.push(")");
			}
			Predicate::Not(inner) => {
				self.writer.push("NOT ");
				if matches!(**inner, Predicate::And(_) | Predicate::Or(_)) {
					self.predicate(inner, clause)?;
				} else {
					self.writer.push("(");
					self.predicate(inner, clause)?;
					self.writer.push(")");
				}
			}
		}
		Ok(())
	}
}

fn collect_paths(expr: &Expr, in_join: bool, out: &mut Vec<(PathExpr, bool)>) {
	match expr {
		Expr::Path(path) => out.push((path.clone(), in_join)),
		Expr::Aggregate(aggregate) => collect_paths(aggregate.arg(), in_join, out),
		Expr::Literal(_) | Expr::SubQuery(_) => {}
	}
}
