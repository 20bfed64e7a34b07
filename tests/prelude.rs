//! The facade prelude is enough to describe, compile and run a query.

use grappelli::prelude::*;
use rstest::rstest;

fn registry() -> std::sync::Arc<MetadataRegistry> {
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

#[rstest]
#[case(DialectKind::Sqlite, "?")]
#[case(DialectKind::Postgres, "$1")]
fn test_compile_through_facade(#[case] dialect: DialectKind, #[case] placeholder: &str) {
	let registry = registry();
	let member = registry.entity("Member", "member").unwrap();
	let age = member.column::<i32>("age").unwrap();

	let compiled = SelectCompiler::for_kind(dialect)
		.compile(&select_from(&member).filter(age.goe(30)))
		.unwrap();

	assert!(compiled.sql().contains(placeholder));
	assert_eq!(compiled.params(), &[Value::Int(30)]);
}

#[cfg(feature = "sqlite")]
#[rstest]
#[tokio::test]
async fn test_session_through_facade() {
	let registry = registry();
	let connection = DatabaseConnection::connect(&OrmSettings::default()).await.unwrap();
	connection
		.execute("CREATE TABLE team (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)", &[])
		.await
		.unwrap();
	let team = registry.entity("Team", "team").unwrap();
	let mut session = Session::begin(&connection, registry.clone()).await.unwrap();

	let created = session.instantiate("Team").unwrap();
	created.set("name", "웹 개발 팀").unwrap();
	session.persist(&created).await.unwrap();
	let count = select_from(&team).fetch_count(&mut session).await.unwrap();
	session.commit().await.unwrap();

	assert_eq!(count, 1);
}
