//! Query behavior against a seeded SQLite store.

mod common;

use std::sync::Arc;

use common::{MEMBERS, Q, new_member, seeded_store};
use grappelli_core::Error;
use grappelli_orm::prelude::*;
use rstest::rstest;

#[rstest]
#[tokio::test]
async fn test_filter_on_typed_columns() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let found: Option<EntityRef> = select_from(&q.member)
		.filter(q.user_name.eq("김영민"))
		.filter(q.age.between(10, 40))
		.fetch_one(&mut session)
		.await
		.unwrap();

	let found = found.unwrap();
	assert_eq!(found.get::<String>("user_name").unwrap().as_deref(), Some("김영민"));
	assert_eq!(found.get::<i32>("age").unwrap(), Some(33));
}

#[rstest]
#[tokio::test]
async fn test_combined_predicates() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let names: Vec<String> = select(&q.user_name)
		.from(&q.member)
		.filter(q.age.lt(28).or(q.age.gt(32)))
		.filter(q.user_name.ne("nobody"))
		.order_by(q.age.asc())
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(names, vec!["김진엽".to_string(), "김영민".to_string()]);
}

#[rstest]
#[tokio::test]
async fn test_in_list_and_null_checks() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let ages: Vec<i32> = select(&q.age)
		.from(&q.member)
		.filter(q.age.is_in([27, 29, 99]))
		.filter(q.user_name.is_not_null())
		.order_by(q.age.asc())
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(ages, vec![27, 29]);
}

#[rstest]
#[tokio::test]
async fn test_fetch_count_matches_fetch() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	let plan = select_from(&q.member).filter(q.age.goe(28));

	let count = plan.fetch_count(&mut session).await.unwrap();
	let members: Vec<EntityRef> = plan.fetch(&mut session).await.unwrap();

	assert_eq!(count, 4);
	assert_eq!(count as usize, members.len());
}

#[rstest]
#[tokio::test]
async fn test_fetch_first_and_empty_fetch_one() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let youngest: Option<String> = select(&q.user_name)
		.from(&q.member)
		.order_by(q.age.asc())
		.fetch_first(&mut session)
		.await
		.unwrap();
	let nobody: Option<EntityRef> = select_from(&q.member)
		.filter(q.age.gt(200))
		.fetch_one(&mut session)
		.await
		.unwrap();
	let several = select_from(&q.member).fetch_one::<EntityRef>(&mut session).await;

	assert_eq!(youngest.as_deref(), Some("김진엽"));
	assert!(nobody.is_none());
	assert!(matches!(several, Err(Error::NonUniqueResult(5))));
}

#[rstest]
#[tokio::test]
async fn test_sort_with_nulls_last() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	new_member(&mut session, None, 100, None).await;
	new_member(&mut session, Some("김영민"), 100, None).await;
	new_member(&mut session, Some("정주리"), 100, None).await;

	let names: Vec<Option<String>> = select(&q.user_name)
		.from(&q.member)
		.filter(q.age.eq(100))
		.order_by(q.age.asc())
		.order_by(q.user_name.desc().nulls_last())
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(
		names,
		vec![Some("정주리".to_string()), Some("김영민".to_string()), None]
	);
}

#[rstest]
#[case(0, 2, vec![33, 30])]
#[case(1, 2, vec![30, 29])]
#[case(4, 10, vec![27])]
#[case(0, 5, vec![33, 30, 29, 28, 27])]
#[case(0, 10, vec![33, 30, 29, 28, 27])]
#[tokio::test]
async fn test_paging(#[case] offset: i64, #[case] limit: i64, #[case] expected: Vec<i32>) {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let page: QueryResults<i32> = select(&q.age)
		.from(&q.member)
		.order_by(q.age.desc())
		.offset(offset)
		.unwrap()
		.limit(limit)
		.unwrap()
		.fetch_results(&mut session)
		.await
		.unwrap();

	assert_eq!(page.total(), MEMBERS.len() as u64);
	assert_eq!(page.offset(), Some(offset as u64));
	assert_eq!(page.limit(), Some(limit as u64));
	assert_eq!(page.results(), expected.as_slice());
}

#[rstest]
#[tokio::test]
async fn test_negative_paging_is_rejected() {
	let (_connection, q) = seeded_store().await;

	assert!(matches!(
		select_from(&q.member).limit(-1),
		Err(Error::InvalidArgument(_))
	));
	assert!(matches!(
		select_from(&q.member).offset(-3),
		Err(Error::InvalidArgument(_))
	));
}

#[rstest]
#[tokio::test]
async fn test_aggregates() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	let (count, sum, avg, max, min) = (q.age.count(), q.age.sum(), q.age.avg(), q.age.max(), q.age.min());

	let row: Tuple = select((&count, &sum, &avg, &max, &min))
		.from(&q.member)
		.fetch_one(&mut session)
		.await
		.unwrap()
		.unwrap();

	assert_eq!(row.get::<i64>(&count).unwrap(), 5);
	assert_eq!(row.get::<i32>(&sum).unwrap(), 147);
	assert!((row.get::<f64>(&avg).unwrap() - 29.4).abs() < 1e-9);
	assert_eq!(row.get::<i32>(&max).unwrap(), 33);
	assert_eq!(row.get::<i32>(&min).unwrap(), 27);
}

#[rstest]
#[tokio::test]
async fn test_group_by_team_name() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	let average = q.age.avg();

	let rows: Vec<Tuple> = select((&q.team_name, &average))
		.from(&q.member)
		.inner_join(&q.member.association("team").unwrap(), &q.team)
		.group_by(&q.team_name)
		.order_by(q.team_name.asc())
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(rows.len(), 2);
	assert_eq!(rows[0].get::<String>(&q.team_name).unwrap(), "데이터 플랫폼 팀");
	assert!((rows[0].get::<f64>(&average).unwrap() - 31.5).abs() < 1e-9);
	assert_eq!(rows[1].get::<String>(&q.team_name).unwrap(), "인프라 팀");
	assert!((rows[1].get::<f64>(&average).unwrap() - 28.0).abs() < 1e-9);
}

#[rstest]
#[tokio::test]
async fn test_having_filters_groups() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	let members = q.member.count();

	let plan = select((&q.team_name, &members))
		.from(&q.member)
		.inner_join(&q.member.association("team").unwrap(), &q.team)
		.group_by(&q.team_name)
		.having(members.gt(2));
	let rows: Vec<Tuple> = plan.fetch(&mut session).await.unwrap();
	let groups = plan.fetch_count(&mut session).await.unwrap();

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].get::<String>(0usize).unwrap(), "인프라 팀");
	assert_eq!(rows[0].get::<i64>(&members).unwrap(), 3);
	assert_eq!(groups, 1);
}

#[rstest]
#[tokio::test]
async fn test_inner_join_filters_on_joined_alias() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let names: Vec<String> = select(&q.user_name)
		.from(&q.member)
		.inner_join(&q.member.association("team").unwrap(), &q.team)
		.filter(q.team_name.eq("데이터 플랫폼 팀"))
		.order_by(q.age.desc())
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(names, vec!["김영민".to_string(), "원영식".to_string()]);
}

#[rstest]
#[tokio::test]
async fn test_implicit_join_through_path() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let count = select_from(&q.member)
		.filter(q.member.path("team.name").unwrap().eq("인프라 팀").unwrap())
		.fetch_count(&mut session)
		.await
		.unwrap();

	assert_eq!(count, 3);
}

#[rstest]
#[tokio::test]
async fn test_left_join_on_keeps_unmatched_rows() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	let team = q.member.association("team").unwrap();

	let joined: Vec<Tuple> = select((&q.member, &q.team))
		.from(&q.member)
		.left_join(&team, &q.team)
		.on(q.team_name.eq("인프라 팀"))
		.unwrap()
		.order_by(q.member.id().asc())
		.fetch(&mut session)
		.await
		.unwrap();
	let filtered: Vec<Tuple> = select((&q.member, &q.team))
		.from(&q.member)
		.left_join(&team, &q.team)
		.filter(q.team_name.eq("인프라 팀"))
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(joined.len(), 5);
	assert!(joined[0].get::<Option<EntityRef>>(&q.team).unwrap().is_none());
	let matched = joined[2].get::<Option<EntityRef>>(&q.team).unwrap().unwrap();
	assert_eq!(matched.get::<String>("name").unwrap().as_deref(), Some("인프라 팀"));
	assert_eq!(filtered.len(), 3);
}

#[rstest]
#[tokio::test]
async fn test_theta_join_on_unrelated_columns() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	new_member(&mut session, Some("데이터 플랫폼 팀"), 0, None).await;
	new_member(&mut session, Some("인프라 팀"), 0, None).await;

	let names: Vec<String> = select(&q.user_name)
		.from((q.member.clone(), q.team.clone()))
		.filter(q.user_name.eq(&q.team_name))
		.order_by(q.member.id().asc())
		.fetch(&mut session)
		.await
		.unwrap();
	let left: Vec<Tuple> = select((&q.member, &q.team))
		.from(&q.member)
		.left_theta_join(&q.team)
		.on(q.user_name.eq(&q.team_name))
		.unwrap()
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(names, vec!["데이터 플랫폼 팀".to_string(), "인프라 팀".to_string()]);
	assert_eq!(left.len(), 7);
}

#[rstest]
#[tokio::test]
async fn test_fetch_join_loads_reference() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let members: Vec<EntityRef> = select_from(&q.member)
		.inner_join(&q.member.association("team").unwrap(), &q.team)
		.fetch_join()
		.unwrap()
		.order_by(q.member.id().asc())
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(members.len(), 5);
	assert!(members.iter().all(|m| m.is_loaded("team").unwrap()));
	let first = members[0].reference("team").unwrap().unwrap();
	let second = members[1].reference("team").unwrap().unwrap();
	assert!(Arc::ptr_eq(&first, &second));
}

#[rstest]
#[tokio::test]
async fn test_distinct_fetch_join_collection() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let teams: Vec<EntityRef> = select_from(&q.team)
		.inner_join(&q.team.association("members").unwrap(), &q.member)
		.fetch_join()
		.unwrap()
		.distinct()
		.order_by(q.team.id().asc())
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(teams.len(), 2);
	assert_eq!(teams[0].collection("members").unwrap().len(), 2);
	assert_eq!(teams[1].collection("members").unwrap().len(), 3);
}

#[rstest]
#[tokio::test]
async fn test_distinct_fetch_join_tuple_count_matches_fetch() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	let plan = select((&q.team, &q.team_name))
		.from(&q.team)
		.inner_join(&q.team.association("members").unwrap(), &q.member)
		.fetch_join()
		.unwrap()
		.distinct()
		.order_by(q.team.id().asc());

	let rows: Vec<Tuple> = plan.fetch(&mut session).await.unwrap();
	let count = plan.fetch_count(&mut session).await.unwrap();

	assert_eq!(rows.len(), 2);
	assert_eq!(count as usize, rows.len());
	assert_eq!(rows[1].get::<String>(&q.team_name).unwrap(), "인프라 팀");
	let team: EntityRef = rows[1].get(&q.team).unwrap();
	assert_eq!(team.collection("members").unwrap().len(), 3);
}

#[rstest]
#[tokio::test]
async fn test_fetch_join_with_on_is_rejected_before_execution() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();

	let result = select_from(&q.team)
		.left_join(&q.team.association("members").unwrap(), &q.member)
		.on(q.age.goe(30))
		.unwrap()
		.fetch_join()
		.unwrap()
		.distinct()
		.fetch::<EntityRef>(&mut session)
		.await;
	assert!(matches!(result, Err(Error::InvalidPlan(_))));

	let team: EntityRef = select_from(&q.team)
		.filter(q.team_name.eq("인프라 팀"))
		.fetch_one(&mut session)
		.await
		.unwrap()
		.unwrap();
	let AssociationState::Many(members) = session.resolve(&team, "members").await.unwrap() else {
		panic!("expected a collection");
	};
	assert_eq!(members.len(), 3);
}

#[rstest]
#[tokio::test]
async fn test_scalar_subquery_in_select() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	let sub = q.member.aliased("member_sub");
	let sub_age = sub.column::<i32>("age").unwrap();
	let average = select(sub_age.avg()).from(&sub).as_scalar::<f64>().unwrap();

	let rows: Vec<Tuple> = select((&q.user_name, &average))
		.from(&q.member)
		.order_by(q.member.id().asc())
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(rows.len(), MEMBERS.len());
	for row in &rows {
		let value: f64 = row.get(&average).unwrap();
		assert!((value - 29.4).abs() < 1e-9);
	}
	assert_eq!(rows[0].get::<String>(&q.user_name).unwrap(), "김영민");
}

#[rstest]
#[tokio::test]
async fn test_correlated_subquery_in_select() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	let sub = q.member.aliased("member_sub");
	let teammates = select(sub.id().count())
		.from(&sub)
		.filter(
			sub.foreign_key("team")
				.unwrap()
				.eq(q.member.foreign_key("team").unwrap())
				.unwrap(),
		)
		.as_scalar::<i64>()
		.unwrap();

	let counts: Vec<i64> = select((&q.user_name, &teammates))
		.from(&q.member)
		.order_by(q.member.id().asc())
		.fetch::<Tuple>(&mut session)
		.await
		.unwrap()
		.iter()
		.map(|row| row.get::<i64>(1usize).unwrap())
		.collect();

	assert_eq!(counts, vec![2, 2, 3, 3, 3]);
}

#[rstest]
#[tokio::test]
async fn test_scalar_subquery_in_where() {
	let (connection, q) = seeded_store().await;
	let mut session = Session::begin(&connection, q.registry.clone()).await.unwrap();
	let sub = q.member.aliased("member_sub");
	let sub_age = sub.column::<i32>("age").unwrap();

	let oldest: Vec<String> = select(&q.user_name)
		.from(&q.member)
		.filter(q.age.eq(select(sub_age.max()).from(&sub).as_scalar::<i32>().unwrap()))
		.fetch(&mut session)
		.await
		.unwrap();
	let above_average: Vec<i32> = select(&q.age)
		.from(&q.member)
		.filter(
			q.age
				.expr()
				.clone()
				.goe(select(sub_age.avg()).from(&sub).as_scalar::<f64>().unwrap())
				.unwrap(),
		)
		.order_by(q.age.desc())
		.fetch(&mut session)
		.await
		.unwrap();
	let in_subquery: Vec<i32> = select(&q.age)
		.from(&q.member)
		.filter(q.age.is_in(select(&sub_age).from(&sub).filter(sub_age.goe(30)).as_scalar::<i32>().unwrap()))
		.order_by(q.age.desc())
		.fetch(&mut session)
		.await
		.unwrap();

	assert_eq!(oldest, vec!["김영민".to_string()]);
	assert_eq!(above_average, vec![33, 30]);
	assert_eq!(in_subquery, vec![33, 30]);
}
