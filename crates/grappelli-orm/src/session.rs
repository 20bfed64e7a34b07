//! Sessions
//!
//! A [`Session`] is one unit of work: a transaction on the store plus the
//! identity map of every instance read or written through it. Plans are
//! compiled for the connection's dialect, executed inside the transaction,
//! and their rows materialized through the identity map, so the same row is
//! always the same [`EntityRef`] for the lifetime of the session.
//!
//! ```rust,ignore
//! let mut session = Session::begin(&connection, registry.clone()).await?;
//!
//! let member = registry.entity("Member", "member")?;
//! let age = member.column::<i32>("age")?;
//! let oldest: Vec<EntityRef> = session
//!     .fetch(&select_from(&member).filter(age.goe(30)).order_by(age.desc()))
//!     .await?;
//!
//! oldest[0].set("age", 34)?;
//! session.commit().await?; // flushes the UPDATE, then commits
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use grappelli_core::{Error, Result, Value};
use grappelli_query::compiler::{CompiledStatement, compile_insert, compile_update};
use grappelli_query::metadata::Cardinality;
use grappelli_query::{Dialect, DialectKind, MetadataRegistry, QueryPlan, SelectCompiler, select_from};
use tracing::{debug, info, trace};

use crate::connection::{DatabaseConnection, RowSet};
use crate::entity::{AssociationState, Entity, EntityRef};
use crate::hydrate::Hydrator;
use crate::identity::{EntityKey, IdentityMap};
use crate::record::{FromRecord, QueryResults, Record};
use crate::transaction::{TransactionState, UnitOfWork};

pub struct Session {
	registry: Arc<MetadataRegistry>,
	unit: UnitOfWork,
	identity: IdentityMap,
	dialect: &'static dyn Dialect,
	compiler: SelectCompiler,
	echo: bool,
	flush_on_commit: bool,
}

impl Session {
	/// Open a transaction on `connection` with an empty identity map.
	pub async fn begin(connection: &DatabaseConnection, registry: Arc<MetadataRegistry>) -> Result<Self> {
		let mut unit = UnitOfWork::new();
		unit.begin(connection.backend().as_ref()).await?;
		let kind = connection.dialect();
		let settings = connection.settings();
		Ok(Self {
			registry,
			unit,
			identity: IdentityMap::new(),
			dialect: kind.dialect(),
			compiler: SelectCompiler::for_kind(kind),
			echo: settings.echo,
			flush_on_commit: settings.flush_on_commit,
		})
	}

	pub fn registry(&self) -> &Arc<MetadataRegistry> {
		&self.registry
	}

	pub fn dialect(&self) -> DialectKind {
		self.dialect.kind()
	}

	pub fn state(&self) -> TransactionState {
		self.unit.state()
	}

	pub fn identity_map(&self) -> &IdentityMap {
		&self.identity
	}

	/// Whether this exact instance belongs to the session.
	pub fn contains(&self, entity: &EntityRef) -> bool {
		self.identity.contains(entity)
	}

	/// A new transient instance of `entity`.
	pub fn instantiate(&self, entity: &str) -> Result<EntityRef> {
		Ok(Arc::new(Entity::new(self.registry.describe(entity)?)))
	}

	/// Insert a transient instance and register it. A `NULL` primary key is
	/// generated by the store and read back.
	///
	/// Persisting an instance the session already holds does nothing.
	///
	/// # Errors
	///
	/// - [`Error::InvalidArgument`] when the instance belongs to another
	///   session, its key is already taken in this one, or it references an
	///   instance that has not been persisted
	/// - [`Error::Execution`] when the insert fails
	pub async fn persist(&mut self, entity: &EntityRef) -> Result<()> {
		if entity.is_managed() {
			if self.identity.contains(entity) {
				return Ok(());
			}
			return Err(Error::InvalidArgument(format!(
				"{} {} belongs to another unit of work",
				entity.name(),
				entity.id()
			)));
		}

		let metadata = Arc::clone(entity.metadata());
		let generated = entity.id().is_null();
		if !generated && self.identity.get(&EntityKey::new(metadata.name(), &entity.id())?).is_some() {
			return Err(Error::InvalidArgument(format!(
				"{} {} is already in the unit of work",
				metadata.name(),
				entity.id()
			)));
		}

		let assignments = entity.insert_assignments()?;
		let statement = compile_insert(self.dialect, &metadata, &assignments, generated);
		let rows = self.run(&statement).await?;

		if generated {
			let id = if self.dialect.supports_returning() {
				rows.first_value().cloned()
			} else if let Some(sql) = self.dialect.last_insert_id_sql() {
				let statement = CompiledStatement::new(sql, Vec::new());
				self.run(&statement).await?.first_value().cloned()
			} else {
				None
			};
			let id = id.filter(|id| !id.is_null()).ok_or_else(|| {
				Error::execution(format!("insert into {} returned no generated key", metadata.table()))
			})?;
			entity.assign_id(id)?;
		}

		entity.mark_managed();
		self.identity.register(Arc::clone(entity))?;
		debug!(entity = metadata.name(), id = %entity.id(), "persisted");
		Ok(())
	}

	/// Look an instance up by primary key, consulting the identity map
	/// before the store.
	pub async fn find(&mut self, entity: &str, id: impl Into<Value>) -> Result<Option<EntityRef>> {
		let metadata = self.registry.describe(entity)?;
		let key_type = metadata.primary_key().semantic_type();
		let id = id.into();
		if let Some(actual) = id.semantic_type()
			&& !key_type.is_comparable_with(actual)
		{
			return Err(Error::type_mismatch(format!("find {}", entity), key_type, actual));
		}
		let id = key_type.coerce(id)?;

		let key = EntityKey::new(entity, &id)?;
		if let Some(existing) = self.identity.get(&key) {
			trace!(entity, id = %id, "identity map hit");
			return Ok(Some(Arc::clone(existing)));
		}

		let path = self.registry.entity(entity, metadata.table())?;
		let plan = select_from(&path).filter(path.id().eq(id)?);
		self.fetch_one(&plan).await
	}

	/// Load a deferred association. Loaded associations are returned as they
	/// are.
	///
	/// A to-one association goes through [`find`](Self::find), so an
	/// instance already in the identity map costs no statement. A to-many
	/// association is read with one query on the target's foreign key,
	/// ordered by the target's primary key.
	pub async fn resolve(&mut self, entity: &EntityRef, association: &str) -> Result<AssociationState> {
		let index = entity.metadata().association_index(association)?;
		let key = match entity.association_at(index) {
			AssociationState::Deferred(key) => key,
			loaded => return Ok(loaded),
		};
		let metadata = entity.metadata().associations()[index].clone();
		debug!(entity = entity.name(), association, key = %key, "lazy load");

		let loaded = match metadata.mapped_by() {
			None => AssociationState::One(self.find(metadata.target(), key).await?),
			Some(mapped_by) => {
				let target_metadata = self.registry.describe(metadata.target())?;
				let target = self.registry.entity(metadata.target(), target_metadata.table())?;
				let plan = select_from(&target)
					.filter(target.foreign_key(mapped_by)?.eq(key)?)
					.order_by(target.id().asc());
				let items: Vec<EntityRef> = self.fetch(&plan).await?;

				let back = target_metadata.association_index(mapped_by)?;
				for item in &items {
					item.fill_deferred(back, AssociationState::One(Some(Arc::clone(entity))));
				}
				match metadata.cardinality() {
					Cardinality::Many => AssociationState::Many(items),
					Cardinality::One if items.len() > 1 => return Err(Error::NonUniqueResult(items.len())),
					Cardinality::One => AssociationState::One(items.into_iter().next()),
				}
			}
		};

		entity.fill_deferred(index, loaded);
		Ok(entity.association_at(index))
	}

	/// Write pending changes of managed instances. Returns the number of
	/// `UPDATE`s issued.
	pub async fn flush(&mut self) -> Result<usize> {
		let mut updates = Vec::new();
		for entity in self.identity.iter().filter(|e| e.is_dirty()) {
			let changes = entity.take_changes()?;
			if !changes.is_empty() {
				updates.push(compile_update(self.dialect, entity.metadata(), &changes, entity.id())?);
			}
		}
		for statement in &updates {
			self.run(statement).await?;
		}
		debug!(updates = updates.len(), "flushed");
		Ok(updates.len())
	}

	/// Detach every instance. Later reads build fresh instances.
	pub fn clear(&mut self) {
		self.detach_all();
		debug!("identity map cleared");
	}

	/// Run raw SQL inside the session's transaction.
	pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowSet> {
		let statement = CompiledStatement::new(sql, params.to_vec());
		self.run(&statement).await
	}

	/// Every result of the plan.
	pub async fn fetch<R: FromRecord>(&mut self, plan: &QueryPlan) -> Result<Vec<R>> {
		self.fetch_records(plan)
			.await?
			.into_iter()
			.map(R::from_record)
			.collect()
	}

	/// The only result of the plan, `None` when there is none.
	///
	/// # Errors
	///
	/// Returns [`Error::NonUniqueResult`] when more than one row matches.
	pub async fn fetch_one<R: FromRecord>(&mut self, plan: &QueryPlan) -> Result<Option<R>> {
		let mut records = self.fetch_records(plan).await?;
		match records.len() {
			0 | 1 => records.pop().map(R::from_record).transpose(),
			n => Err(Error::NonUniqueResult(n)),
		}
	}

	/// The first result of the plan, fetched with a limit of one.
	pub async fn fetch_first<R: FromRecord>(&mut self, plan: &QueryPlan) -> Result<Option<R>> {
		let limit = if plan.limit_value() == Some(0) { 0 } else { 1 };
		let plan = plan.clone().limit(limit)?;
		let records = self.fetch_records(&plan).await?;
		records.into_iter().next().map(R::from_record).transpose()
	}

	/// Number of rows the plan matches, ignoring ordering and paging.
	pub async fn fetch_count(&mut self, plan: &QueryPlan) -> Result<u64> {
		let statement = self.compiler.compile_count(plan)?;
		let rows = self.run(&statement).await?;
		let count = i64::try_from(rows.first_value().cloned().unwrap_or(Value::Int(0)))?;
		u64::try_from(count).map_err(|_| Error::Decode {
			expected: "u64",
			value: count.to_string(),
		})
	}

	/// One page of results plus the unpaged total. The page is not read
	/// when the total is zero.
	pub async fn fetch_results<R: FromRecord>(&mut self, plan: &QueryPlan) -> Result<QueryResults<R>> {
		let total = self.fetch_count(plan).await?;
		let results = if total == 0 {
			Vec::new()
		} else {
			self.fetch(plan).await?
		};
		Ok(QueryResults::new(
			results,
			total,
			plan.offset_value(),
			plan.limit_value(),
		))
	}

	/// Flush (unless disabled in the settings) and commit.
	pub async fn commit(mut self) -> Result<()> {
		if self.flush_on_commit {
			self.flush().await?;
		}
		self.unit.commit().await?;
		self.detach_all();
		Ok(())
	}

	/// Discard every change made in the session.
	pub async fn rollback(mut self) -> Result<()> {
		self.unit.rollback().await?;
		self.detach_all();
		Ok(())
	}

	async fn fetch_records(&mut self, plan: &QueryPlan) -> Result<Vec<Record>> {
		let compiled = self.compiler.compile(plan)?;
		let rows = self.run(compiled.statement()).await?;
		let layout = compiled.layout();
		let mut records = Hydrator::new(&mut self.identity).records(layout, rows.into_rows())?;

		// Fetched columns are not part of the projection; rows repeat once per
		// fetched item.
		if plan.is_distinct() && !layout.fetches().is_empty() {
			let mut seen = HashSet::new();
			records.retain(|record| seen.insert(record.distinct_key()));
		}
		Ok(records)
	}

	async fn run(&mut self, statement: &CompiledStatement) -> Result<RowSet> {
		if self.echo {
			info!(sql = statement.sql(), params = statement.params().len(), "execute");
		} else {
			debug!(sql = statement.sql(), params = statement.params().len(), "execute");
		}
		self.unit.execute(statement.sql(), statement.params()).await
	}

	fn detach_all(&mut self) {
		for entity in self.identity.iter() {
			entity.detach();
		}
		self.identity.clear();
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("dialect", &self.dialect.kind())
			.field("state", &self.unit.state())
			.field("instances", &self.identity.len())
			.finish()
	}
}
