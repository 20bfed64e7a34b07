//! SQLite backend over an `sqlx` pool

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grappelli_core::Value;
use grappelli_query::DialectKind;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, SqlitePool, Transaction, TypeInfo, ValueRef};
use tracing::debug;

use crate::connection::{Connection, DatabaseError, RowSet, TransactionExecutor, TransactionManager};

/// SQLite database backend
pub struct SqliteBackend {
	pool: Arc<SqlitePool>,
}

impl SqliteBackend {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool: Arc::new(pool),
		}
	}

	/// Open a pool for `url`, creating the database file when missing.
	///
	/// An in-memory database lives as long as its connection, so in-memory
	/// URLs get a single connection that is never recycled.
	pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DatabaseError> {
		let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
		let in_memory = url.contains(":memory:") || url.contains("mode=memory");
		let pool_options = if in_memory {
			SqlitePoolOptions::new()
				.max_connections(1)
				.idle_timeout(None::<Duration>)
				.max_lifetime(None::<Duration>)
		} else {
			SqlitePoolOptions::new().max_connections(max_connections.max(1))
		};
		let pool = pool_options.connect_with(options).await?;
		debug!(url, in_memory, "opened sqlite pool");
		Ok(Self::new(pool))
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}

#[async_trait]
impl Connection for SqliteBackend {
	fn dialect(&self) -> DialectKind {
		DialectKind::Sqlite
	}

	async fn execute(&self, sql: &str, params: &[Value]) -> Result<RowSet, DatabaseError> {
		let rows = build_query(sql, params).fetch_all(self.pool.as_ref()).await?;
		convert_rows(&rows)
	}
}

#[async_trait]
impl TransactionManager for SqliteBackend {
	async fn begin(&self) -> Result<Box<dyn TransactionExecutor>, DatabaseError> {
		let tx = self.pool.begin().await?;
		Ok(Box::new(SqliteTransactionExecutor::new(tx)))
	}
}

/// SQLite transaction executor
pub struct SqliteTransactionExecutor {
	tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteTransactionExecutor {
	pub fn new(tx: Transaction<'static, Sqlite>) -> Self {
		Self { tx: Some(tx) }
	}
}

fn consumed() -> DatabaseError {
	DatabaseError::Transaction("Transaction already consumed".to_string())
}

#[async_trait]
impl TransactionExecutor for SqliteTransactionExecutor {
	async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DatabaseError> {
		let tx = self.tx.as_mut().ok_or_else(consumed)?;
		let rows = build_query(sql, params).fetch_all(&mut **tx).await?;
		convert_rows(&rows)
	}

	async fn commit(mut self: Box<Self>) -> Result<(), DatabaseError> {
		let tx = self.tx.take().ok_or_else(consumed)?;
		tx.commit().await?;
		Ok(())
	}

	async fn rollback(mut self: Box<Self>) -> Result<(), DatabaseError> {
		let tx = self.tx.take().ok_or_else(consumed)?;
		tx.rollback().await?;
		Ok(())
	}
}

fn build_query<'q>(sql: &'q str, params: &'q [Value]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
	params.iter().fold(sqlx::query(sql), bind_value)
}

fn bind_value<'q>(
	query: Query<'q, Sqlite, SqliteArguments<'q>>,
	value: &'q Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
	match value {
		Value::Null => query.bind(None::<i64>),
		Value::Bool(b) => query.bind(*b),
		Value::Int(i) => query.bind(*i),
		Value::Float(f) => query.bind(*f),
		Value::Text(s) => query.bind(s.as_str()),
	}
}

fn convert_rows(rows: &[SqliteRow]) -> Result<RowSet, DatabaseError> {
	let columns = rows
		.first()
		.map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
		.unwrap_or_default();
	let values = rows.iter().map(convert_row).collect::<Result<Vec<_>, _>>()?;
	Ok(RowSet::new(columns, values))
}

/// Values are read by position: joined tables share column names.
fn convert_row(row: &SqliteRow) -> Result<Vec<Value>, DatabaseError> {
	let mut values = Vec::with_capacity(row.len());
	for (index, column) in row.columns().iter().enumerate() {
		if row.try_get_raw(index)?.is_null() {
			values.push(Value::Null);
			continue;
		}

		// SQLite stores booleans as integers; only the declared type tells them apart.
		let type_name = column.type_info().name().to_uppercase();
		let value = if type_name.contains("BOOL") {
			match row.try_get::<bool, _>(index) {
				Ok(b) => Value::Bool(b),
				Err(_) => Value::Bool(row.try_get::<i64, _>(index)? != 0),
			}
		} else if let Ok(i) = row.try_get::<i64, _>(index) {
			Value::Int(i)
		} else if let Ok(f) = row.try_get::<f64, _>(index) {
			Value::Float(f)
		} else if let Ok(s) = row.try_get::<String, _>(index) {
			Value::Text(s)
		} else if let Ok(bytes) = row.try_get::<Vec<u8>, _>(index) {
			Value::Text(String::from_utf8_lossy(&bytes).into_owned())
		} else {
			return Err(DatabaseError::Query(format!(
				"cannot decode column {} of type {}",
				column.name(),
				type_name
			)));
		};
		values.push(value);
	}
	Ok(values)
}
