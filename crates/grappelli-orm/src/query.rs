//! Terminal operations on plans
//!
//! [`Fetch`] lets a [`QueryPlan`] be executed directly against a session:
//!
//! ```rust,ignore
//! let adults: Vec<EntityRef> = select_from(&member)
//!     .filter(age.goe(20))
//!     .fetch(&mut session)
//!     .await?;
//! ```

use async_trait::async_trait;
use grappelli_core::Result;
use grappelli_query::QueryPlan;

use crate::record::{FromRecord, QueryResults};
use crate::session::Session;

#[async_trait]
pub trait Fetch {
	/// Every result.
	async fn fetch<R: FromRecord>(&self, session: &mut Session) -> Result<Vec<R>>;

	/// The only result; [`Error::NonUniqueResult`](grappelli_core::Error::NonUniqueResult)
	/// when there are several.
	async fn fetch_one<R: FromRecord>(&self, session: &mut Session) -> Result<Option<R>>;

	async fn fetch_first<R: FromRecord>(&self, session: &mut Session) -> Result<Option<R>>;

	async fn fetch_count(&self, session: &mut Session) -> Result<u64>;

	async fn fetch_results<R: FromRecord>(&self, session: &mut Session) -> Result<QueryResults<R>>;
}

#[async_trait]
impl Fetch for QueryPlan {
	async fn fetch<R: FromRecord>(&self, session: &mut Session) -> Result<Vec<R>> {
		session.fetch(self).await
	}

	async fn fetch_one<R: FromRecord>(&self, session: &mut Session) -> Result<Option<R>> {
		session.fetch_one(self).await
	}

	async fn fetch_first<R: FromRecord>(&self, session: &mut Session) -> Result<Option<R>> {
		session.fetch_first(self).await
	}

	async fn fetch_count(&self, session: &mut Session) -> Result<u64> {
		session.fetch_count(self).await
	}

	async fn fetch_results<R: FromRecord>(&self, session: &mut Session) -> Result<QueryResults<R>> {
		session.fetch_results(self).await
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::connection::DatabaseConnection;
	use crate::entity::EntityRef;
	use crate::settings::OrmSettings;
	use crate::test_support::{MockBackend, member_row, registry, rows};
	use grappelli_core::Value;
	use grappelli_query::{DialectKind, select, select_from};
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_plan_fetches_through_session() {
		let backend = MockBackend::new(DialectKind::Sqlite);
		let connection = DatabaseConnection::from_backend(Arc::new(backend.clone()), OrmSettings::default());
		let registry = registry();
		let member = registry.entity("Member", "member").unwrap();
		let age = member.column::<i32>("age").unwrap();
		let mut session = Session::begin(&connection, registry.clone()).await.unwrap();
		backend.push_rows(rows(vec![member_row(1, "김영민", 33, Some(1))]));
		backend.push_rows(rows(vec![vec![Value::Int(1)]]));
		backend.push_rows(rows(vec![vec![Value::Int(33)]]));

		let members: Vec<EntityRef> = select_from(&member).fetch(&mut session).await.unwrap();
		let count = select_from(&member).fetch_count(&mut session).await.unwrap();
		let oldest: Option<i32> = select(age.max()).from(&member).fetch_one(&mut session).await.unwrap();

		assert_eq!(members.len(), 1);
		assert_eq!(count, 1);
		assert_eq!(oldest, Some(33));
		assert!(backend.statements()[1].starts_with("SELECT COUNT(*)"));
	}
}
