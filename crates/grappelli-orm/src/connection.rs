//! Connection and transaction capabilities
//!
//! The execution layer only needs two things from a store: run a
//! parameterized statement and get rows back ([`Connection`]), and open a
//! transaction that does the same until it is committed or rolled back
//! ([`TransactionManager`] / [`TransactionExecutor`]). Backends implement
//! both; [`DatabaseConnection`] is the cloneable handle sessions start from.

use std::sync::Arc;

use async_trait::async_trait;
use grappelli_core::{Error, Value};
use grappelli_query::DialectKind;
use thiserror::Error;

use crate::settings::OrmSettings;

/// Failures raised by a backend.
#[derive(Debug, Error)]
pub enum DatabaseError {
	#[cfg(feature = "sqlite")]
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Connection error: {0}")]
	Connection(String),

	#[error("Query error: {0}")]
	Query(String),

	#[error("Transaction error: {0}")]
	Transaction(String),
}

impl From<DatabaseError> for Error {
	fn from(error: DatabaseError) -> Self {
		Error::execution(error)
	}
}

/// Rows returned by a statement, every value in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
	columns: Vec<String>,
	rows: Vec<Vec<Value>>,
}

impl RowSet {
	pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
		Self { columns, rows }
	}

	pub fn empty() -> Self {
		Self::default()
	}

	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	pub fn rows(&self) -> &[Vec<Value>] {
		&self.rows
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// First column of the first row.
	pub fn first_value(&self) -> Option<&Value> {
		self.rows.first().and_then(|row| row.first())
	}

	pub fn into_rows(self) -> Vec<Vec<Value>> {
		self.rows
	}
}

/// Executes statements outside of any explicit transaction.
#[async_trait]
pub trait Connection: Send + Sync {
	/// SQL dialect the store speaks.
	fn dialect(&self) -> DialectKind;

	async fn execute(&self, sql: &str, params: &[Value]) -> Result<RowSet, DatabaseError>;
}

/// Opens transactions.
#[async_trait]
pub trait TransactionManager: Send + Sync {
	async fn begin(&self) -> Result<Box<dyn TransactionExecutor>, DatabaseError>;
}

/// A live transaction. Dropping it without committing rolls it back.
#[async_trait]
pub trait TransactionExecutor: Send {
	async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DatabaseError>;

	async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

	async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// A store usable by sessions.
pub trait DatabaseBackend: Connection + TransactionManager {}

impl<T: Connection + TransactionManager> DatabaseBackend for T {}

/// Shared handle to a backend plus the settings sessions are opened with.
#[derive(Clone)]
pub struct DatabaseConnection {
	backend: Arc<dyn DatabaseBackend>,
	settings: OrmSettings,
}

impl DatabaseConnection {
	/// Connect to the store named by `settings.database_url`.
	///
	/// # Errors
	///
	/// Returns [`Error::Configuration`] for URLs no enabled backend handles,
	/// and [`Error::Execution`] when the connection cannot be established.
	pub async fn connect(settings: &OrmSettings) -> grappelli_core::Result<Self> {
		let url = settings.database_url.as_str();
		#[cfg(feature = "sqlite")]
		if url.starts_with("sqlite:") {
			let backend = crate::backends::SqliteBackend::connect(url, settings.max_connections).await?;
			return Ok(Self::from_backend(Arc::new(backend), settings.clone()));
		}
		Err(Error::Configuration(format!("no backend available for {}", url)))
	}

	/// Connect to SQLite with default settings.
	#[cfg(feature = "sqlite")]
	pub async fn connect_sqlite(url: &str) -> grappelli_core::Result<Self> {
		let settings = OrmSettings {
			database_url: url.to_string(),
			..OrmSettings::default()
		};
		Self::connect(&settings).await
	}

	pub fn from_backend(backend: Arc<dyn DatabaseBackend>, settings: OrmSettings) -> Self {
		Self { backend, settings }
	}

	pub fn dialect(&self) -> DialectKind {
		self.backend.dialect()
	}

	pub fn settings(&self) -> &OrmSettings {
		&self.settings
	}

	pub fn backend(&self) -> &Arc<dyn DatabaseBackend> {
		&self.backend
	}

	/// Run a statement in autocommit mode (schema setup, maintenance).
	pub async fn execute(&self, sql: &str, params: &[Value]) -> grappelli_core::Result<RowSet> {
		if self.settings.echo {
			tracing::info!(sql, params = params.len(), "execute");
		} else {
			tracing::debug!(sql, params = params.len(), "execute");
		}
		Ok(self.backend.execute(sql, params).await?)
	}
}

impl std::fmt::Debug for DatabaseConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DatabaseConnection")
			.field("dialect", &self.dialect())
			.field("settings", &self.settings)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::MockBackend;
	use rstest::rstest;

	#[rstest]
	fn test_database_error_becomes_execution() {
		let error: Error = DatabaseError::Query("no such table: member".into()).into();
		assert!(matches!(error, Error::Execution(_)));
		assert_eq!(
			std::error::Error::source(&error).map(|s| s.to_string()),
			Some("Query error: no such table: member".to_string())
		);
	}

	#[rstest]
	fn test_row_set_first_value() {
		let rows = RowSet::new(vec!["count".into()], vec![vec![Value::Int(5)]]);
		assert_eq!(rows.first_value(), Some(&Value::Int(5)));
		assert!(RowSet::empty().first_value().is_none());
	}

	#[rstest]
	#[tokio::test]
	async fn test_execute_goes_to_backend() {
		let backend = Arc::new(MockBackend::new(DialectKind::Sqlite));
		backend.push_rows(RowSet::new(vec!["one".into()], vec![vec![Value::Int(1)]]));
		let connection = DatabaseConnection::from_backend(backend.clone(), OrmSettings::default());

		let rows = connection.execute("SELECT 1", &[]).await.unwrap();

		assert_eq!(rows.len(), 1);
		assert_eq!(backend.statements(), vec!["SELECT 1".to_string()]);
		assert_eq!(connection.dialect(), DialectKind::Sqlite);
	}

	#[rstest]
	#[tokio::test]
	async fn test_connect_rejects_unknown_scheme() {
		let settings = OrmSettings {
			database_url: "oracle://localhost/members".into(),
			..OrmSettings::default()
		};
		let err = DatabaseConnection::connect(&settings).await.unwrap_err();
		assert!(matches!(err, Error::Configuration(_)));
	}
}
