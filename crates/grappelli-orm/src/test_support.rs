//! Scripted backend and member/team registry for the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use grappelli_core::{SemanticType, Value};
use grappelli_query::{DialectKind, EntityDefinition, MetadataRegistry};
use parking_lot::Mutex;

use crate::connection::{Connection, DatabaseError, RowSet, TransactionExecutor, TransactionManager};

#[derive(Default)]
struct MockState {
	responses: VecDeque<RowSet>,
	statements: Vec<(String, Vec<Value>)>,
	commits: usize,
	rollbacks: usize,
}

/// Answers statements with queued row sets, in order, and records them.
/// Clones share the script.
#[derive(Clone)]
pub(crate) struct MockBackend {
	dialect: DialectKind,
	state: Arc<Mutex<MockState>>,
}

impl MockBackend {
	pub(crate) fn new(dialect: DialectKind) -> Self {
		Self {
			dialect,
			state: Arc::new(Mutex::new(MockState::default())),
		}
	}

	pub(crate) fn push_rows(&self, rows: RowSet) {
		self.state.lock().responses.push_back(rows);
	}

	pub(crate) fn statements(&self) -> Vec<String> {
		self.state.lock().statements.iter().map(|(sql, _)| sql.clone()).collect()
	}

	pub(crate) fn params(&self, index: usize) -> Vec<Value> {
		self.state.lock().statements[index].1.clone()
	}

	pub(crate) fn commits(&self) -> usize {
		self.state.lock().commits
	}

	pub(crate) fn rollbacks(&self) -> usize {
		self.state.lock().rollbacks
	}
}

fn answer(state: &Mutex<MockState>, sql: &str, params: &[Value]) -> RowSet {
	let mut state = state.lock();
	state.statements.push((sql.to_string(), params.to_vec()));
	state.responses.pop_front().unwrap_or_default()
}

#[async_trait]
impl Connection for MockBackend {
	fn dialect(&self) -> DialectKind {
		self.dialect
	}

	async fn execute(&self, sql: &str, params: &[Value]) -> Result<RowSet, DatabaseError> {
		Ok(answer(&self.state, sql, params))
	}
}

#[async_trait]
impl TransactionManager for MockBackend {
	async fn begin(&self) -> Result<Box<dyn TransactionExecutor>, DatabaseError> {
		Ok(Box::new(MockTransaction {
			state: Arc::clone(&self.state),
		}))
	}
}

struct MockTransaction {
	state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl TransactionExecutor for MockTransaction {
	async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DatabaseError> {
		Ok(answer(&self.state, sql, params))
	}

	async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
		self.state.lock().commits += 1;
		Ok(())
	}

	async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
		self.state.lock().rollbacks += 1;
		Ok(())
	}
}

/// `Member` rows are `[id, user_name, age, team_id]`, `Team` rows `[id, name]`.
pub(crate) fn registry() -> Arc<MetadataRegistry> {
	MetadataRegistry::builder()
		.register(
			EntityDefinition::new("Team", "team")
				.id("id", SemanticType::Integer)
				.field("name", SemanticType::Text)
				.one_to_many("members", "Member", "team"),
		)
		.register(
			EntityDefinition::new("Member", "member")
				.id("id", SemanticType::Integer)
				.field("user_name", SemanticType::Text)
				.field("age", SemanticType::Integer)
				.many_to_one("team", "Team", "team_id"),
		)
		.build()
		.expect("fixture registry is valid")
}

pub(crate) fn member_row(id: i64, name: &str, age: i64, team: Option<i64>) -> Vec<Value> {
	vec![Value::Int(id), Value::from(name), Value::Int(age), Value::from(team)]
}

pub(crate) fn rows(rows: Vec<Vec<Value>>) -> RowSet {
	RowSet::new(Vec::new(), rows)
}
