//! Unit-of-work transaction handle

use grappelli_core::{Error, Result, Value};
use tracing::{debug, warn};

use crate::connection::{RowSet, TransactionExecutor, TransactionManager};

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
	NotStarted,
	Active,
	Committed,
	RolledBack,
}

/// Owns the transaction a session runs its statements in.
///
/// A unit of work goes through `NotStarted -> Active -> Committed` or
/// `RolledBack` exactly once; every other transition is an
/// [`Error::Transaction`].
pub struct UnitOfWork {
	executor: Option<Box<dyn TransactionExecutor>>,
	state: TransactionState,
}

impl UnitOfWork {
	pub fn new() -> Self {
		Self {
			executor: None,
			state: TransactionState::NotStarted,
		}
	}

	pub fn state(&self) -> TransactionState {
		self.state
	}

	pub fn is_active(&self) -> bool {
		self.state == TransactionState::Active
	}

	pub async fn begin<M>(&mut self, manager: &M) -> Result<()>
	where
		M: TransactionManager + ?Sized,
	{
		if self.state != TransactionState::NotStarted {
			return Err(Error::Transaction(format!(
				"cannot begin a unit of work in state {:?}",
				self.state
			)));
		}
		self.executor = Some(manager.begin().await?);
		self.state = TransactionState::Active;
		debug!("transaction started");
		Ok(())
	}

	pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowSet> {
		let executor = self.active("execute")?;
		Ok(executor.execute(sql, params).await?)
	}

	pub async fn commit(&mut self) -> Result<()> {
		self.active("commit")?;
		if let Some(executor) = self.executor.take() {
			executor.commit().await?;
		}
		self.state = TransactionState::Committed;
		debug!("transaction committed");
		Ok(())
	}

	pub async fn rollback(&mut self) -> Result<()> {
		self.active("roll back")?;
		if let Some(executor) = self.executor.take() {
			executor.rollback().await?;
		}
		self.state = TransactionState::RolledBack;
		debug!("transaction rolled back");
		Ok(())
	}

	fn active(&mut self, action: &str) -> Result<&mut Box<dyn TransactionExecutor>> {
		match (self.state, self.executor.as_mut()) {
			(TransactionState::Active, Some(executor)) => Ok(executor),
			(state, _) => Err(Error::Transaction(format!(
				"cannot {} outside an active transaction (state {:?})",
				action, state
			))),
		}
	}
}

impl Default for UnitOfWork {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for UnitOfWork {
	/// The executor rolls back when dropped; this only reports it.
	fn drop(&mut self) {
		if self.state == TransactionState::Active {
			warn!("unit of work dropped with an active transaction, rolling back");
		}
	}
}

impl std::fmt::Debug for UnitOfWork {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UnitOfWork").field("state", &self.state).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::MockBackend;
	use grappelli_query::DialectKind;
	use rstest::*;

	#[fixture]
	fn backend() -> MockBackend {
		MockBackend::new(DialectKind::Sqlite)
	}

	#[rstest]
	#[tokio::test]
	async fn test_begin_execute_commit(backend: MockBackend) {
		let mut unit = UnitOfWork::new();
		assert_eq!(unit.state(), TransactionState::NotStarted);

		unit.begin(&backend).await.unwrap();
		unit.execute("SELECT 1", &[]).await.unwrap();
		unit.commit().await.unwrap();

		assert_eq!(unit.state(), TransactionState::Committed);
		assert_eq!(backend.commits(), 1);
		assert_eq!(backend.statements(), vec!["SELECT 1".to_string()]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_execute_before_begin(backend: MockBackend) {
		let mut unit = UnitOfWork::new();
		let err = unit.execute("SELECT 1", &[]).await.unwrap_err();
		assert!(matches!(err, Error::Transaction(_)));
		assert!(backend.statements().is_empty());
	}

	#[rstest]
	#[tokio::test]
	async fn test_commit_after_rollback(backend: MockBackend) {
		let mut unit = UnitOfWork::new();
		unit.begin(&backend).await.unwrap();
		unit.rollback().await.unwrap();

		let err = unit.commit().await.unwrap_err();

		assert!(matches!(err, Error::Transaction(_)));
		assert_eq!(unit.state(), TransactionState::RolledBack);
		assert_eq!(backend.rollbacks(), 1);
		assert_eq!(backend.commits(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_begin_twice(backend: MockBackend) {
		let mut unit = UnitOfWork::new();
		unit.begin(&backend).await.unwrap();
		let err = unit.begin(&backend).await.unwrap_err();
		assert!(matches!(err, Error::Transaction(_)));
		assert!(unit.is_active());
	}
}
