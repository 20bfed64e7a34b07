//! Member/team registry shared by the unit tests.

use std::sync::Arc;

use grappelli_core::SemanticType;

use crate::metadata::{EntityDefinition, MetadataRegistry};

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
