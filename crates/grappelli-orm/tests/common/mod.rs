//! Shared fixtures: an in-memory SQLite store seeded with three teams and
//! five members.

#![allow(dead_code)]

use std::sync::Arc;

use grappelli_core::SemanticType;
use grappelli_orm::{DatabaseConnection, EntityRef, Session};
use grappelli_query::{EntityDefinition, EntityPath, MetadataRegistry, TypedExpr};

pub const TEAM_DDL: &str = "CREATE TABLE team (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)";
pub const MEMBER_DDL: &str = "CREATE TABLE member (\
	id INTEGER PRIMARY KEY AUTOINCREMENT, \
	user_name TEXT, \
	age INTEGER, \
	team_id INTEGER REFERENCES team(id))";

pub const TEAMS: [&str; 3] = ["데이터 플랫폼 팀", "인프라 팀", "웹 개발 팀"];

/// `(user_name, age, index into TEAMS)`
pub const MEMBERS: [(&str, i32, usize); 5] = [
	("김영민", 33, 0),
	("원영식", 30, 0),
	("김진엽", 27, 1),
	("박진우", 28, 1),
	("임수현", 29, 1),
];

pub fn registry() -> Arc<MetadataRegistry> {
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
		.unwrap()
}

/// Query aliases over the fixture registry.
pub struct Q {
	pub registry: Arc<MetadataRegistry>,
	pub member: EntityPath,
	pub team: EntityPath,
	pub user_name: TypedExpr<String>,
	pub age: TypedExpr<i32>,
	pub team_name: TypedExpr<String>,
}

impl Q {
	pub fn new(registry: Arc<MetadataRegistry>) -> Self {
		let member = registry.entity("Member", "member").unwrap();
		let team = registry.entity("Team", "team").unwrap();
		Self {
			user_name: member.column("user_name").unwrap(),
			age: member.column("age").unwrap(),
			team_name: team.column("name").unwrap(),
			member,
			team,
			registry,
		}
	}
}

/// Empty schema in a fresh in-memory database.
pub async fn empty_store() -> DatabaseConnection {
	let connection = DatabaseConnection::connect_sqlite("sqlite::memory:").await.unwrap();
	connection.execute(TEAM_DDL, &[]).await.unwrap();
	connection.execute(MEMBER_DDL, &[]).await.unwrap();
	connection
}

/// Fresh store holding the fixture teams and members, committed.
pub async fn seeded_store() -> (DatabaseConnection, Q) {
	let connection = empty_store().await;
	let q = Q::new(registry());
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let mut teams = Vec::new();
	for name in TEAMS {
		teams.push(new_team(&mut session, name).await);
	}
	for (user_name, age, team) in MEMBERS {
		new_member(&mut session, Some(user_name), age, Some(&teams[team])).await;
	}

	session.commit().await.unwrap();
	(connection, q)
}

pub async fn new_team(session: &mut Session, name: &str) -> EntityRef {
	let team = session.instantiate("Team").unwrap();
	team.set("name", name).unwrap();
	session.persist(&team).await.unwrap();
	team
}

pub async fn new_member(
	session: &mut Session,
	user_name: Option<&str>,
	age: i32,
	team: Option<&EntityRef>,
) -> EntityRef {
	let member = session.instantiate("Member").unwrap();
	member.set("user_name", user_name).unwrap();
	member.set("age", age).unwrap();
	member.set_reference("team", team).unwrap();
	session.persist(&member).await.unwrap();
	member
}
