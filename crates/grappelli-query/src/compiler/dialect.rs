//! SQL dialects
//!
//! A [`Dialect`] decides how identifiers are quoted, how placeholders are
//! numbered and how the few non-portable clauses (null ordering, paging,
//! generated keys) are spelled. Everything else the compiler emits is plain
//! ANSI SQL.

use std::fmt;

use grappelli_core::Value;
use serde::{Deserialize, Serialize};

use super::SqlWriter;

/// Dialect-specific SQL rendering.
pub trait Dialect: Send + Sync + fmt::Debug {
	fn kind(&self) -> DialectKind;

	/// Quote an identifier, doubling embedded quote characters.
	fn escape_identifier(&self, ident: &str) -> String {
		format!("\"{}\"", ident.replace('"', "\"\""))
	}

	/// Placeholder for the 1-based parameter `index`.
	fn placeholder(&self, _index: usize) -> String {
		"?".to_string()
	}

	/// Whether `NULLS FIRST` / `NULLS LAST` are understood natively.
	fn supports_nulls_ordering(&self) -> bool {
		true
	}

	/// Whether `INSERT ... RETURNING` is available.
	fn supports_returning(&self) -> bool {
		true
	}

	/// Statement reading the key generated by the last insert, for dialects
	/// without `RETURNING`.
	fn last_insert_id_sql(&self) -> Option<&'static str> {
		None
	}

	/// Write the paging clause. Both bounds are bound parameters.
	fn write_limit_offset(&self, writer: &mut SqlWriter, limit: Option<u64>, offset: Option<u64>) {
		write_bounds(self, writer, limit, offset);
	}
}

fn write_bounds<D: Dialect + ?Sized>(
	dialect: &D,
	writer: &mut SqlWriter,
	limit: Option<u64>,
	offset: Option<u64>,
) {
	if let Some(limit) = limit {
		writer.push_keyword("LIMIT");
		writer.push_space();
		writer.push_value(bound(limit), |i| dialect.placeholder(i));
	}
	if let Some(offset) = offset {
		writer.push_keyword("OFFSET");
		writer.push_space();
		writer.push_value(bound(offset), |i| dialect.placeholder(i));
	}
}

fn bound(value: u64) -> Value {
	Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Portable rendering: `?` placeholders, double-quoted identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {
	fn kind(&self) -> DialectKind {
		DialectKind::Ansi
	}
}

/// SQLite rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
	fn kind(&self) -> DialectKind {
		DialectKind::Sqlite
	}

	// SQLite has no OFFSET without LIMIT; a negative limit means "no limit".
	fn write_limit_offset(&self, writer: &mut SqlWriter, limit: Option<u64>, offset: Option<u64>) {
		match (limit, offset) {
			(None, Some(offset)) => {
				writer.push_keyword("LIMIT -1 OFFSET");
				writer.push_space();
				writer.push_value(bound(offset), |i| self.placeholder(i));
			}
			_ => write_bounds(self, writer, limit, offset),
		}
	}
}

/// PostgreSQL rendering: numbered `$n` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
	fn kind(&self) -> DialectKind {
		DialectKind::Postgres
	}

	fn placeholder(&self, index: usize) -> String {
		format!("${}", index)
	}
}

/// MySQL rendering: backtick identifiers, emulated null ordering, no
/// `RETURNING`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
	fn kind(&self) -> DialectKind {
		DialectKind::Mysql
	}

	fn escape_identifier(&self, ident: &str) -> String {
		format!("`{}`", ident.replace('`', "``"))
	}

	fn supports_nulls_ordering(&self) -> bool {
		false
	}

	fn supports_returning(&self) -> bool {
		false
	}

	fn last_insert_id_sql(&self) -> Option<&'static str> {
		Some("SELECT LAST_INSERT_ID()")
	}

	fn write_limit_offset(&self, writer: &mut SqlWriter, limit: Option<u64>, offset: Option<u64>) {
		match (limit, offset) {
			// Largest LIMIT MySQL accepts; it has no OFFSET-only form.
			(None, Some(offset)) => {
				writer.push_keyword("LIMIT 18446744073709551615 OFFSET");
				writer.push_space();
				writer.push_value(bound(offset), |i| self.placeholder(i));
			}
			_ => write_bounds(self, writer, limit, offset),
		}
	}
}

/// Serializable dialect selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
	Ansi,
	#[default]
	Sqlite,
	Postgres,
	Mysql,
}

static ANSI: AnsiDialect = AnsiDialect;
static SQLITE: SqliteDialect = SqliteDialect;
static POSTGRES: PostgresDialect = PostgresDialect;
static MYSQL: MySqlDialect = MySqlDialect;

impl DialectKind {
	pub fn dialect(self) -> &'static dyn Dialect {
		match self {
			DialectKind::Ansi => &ANSI,
			DialectKind::Sqlite => &SQLITE,
			DialectKind::Postgres => &POSTGRES,
			DialectKind::Mysql => &MYSQL,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			DialectKind::Ansi => "ansi",
			DialectKind::Sqlite => "sqlite",
			DialectKind::Postgres => "postgres",
			DialectKind::Mysql => "mysql",
		}
	}
}

impl fmt::Display for DialectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case::ansi(DialectKind::Ansi, "\"user\"")]
	#[case::postgres(DialectKind::Postgres, "\"user\"")]
	#[case::mysql(DialectKind::Mysql, "`user`")]
	fn test_escape_identifier(#[case] kind: DialectKind, #[case] expected: &str) {
		assert_eq!(kind.dialect().escape_identifier("user"), expected);
	}

	#[rstest]
	fn test_escape_identifier_with_quotes() {
		let escaped = SqliteDialect.escape_identifier("user\"name");
		assert_eq!(escaped, "\"user\"\"name\"");
	}

	#[rstest]
	fn test_postgres_placeholders_are_numbered() {
		assert_eq!(PostgresDialect.placeholder(1), "$1");
		assert_eq!(PostgresDialect.placeholder(10), "$10");
		assert_eq!(SqliteDialect.placeholder(10), "?");
	}

	#[rstest]
	#[case::ansi(DialectKind::Ansi, " OFFSET ?")]
	#[case::sqlite(DialectKind::Sqlite, " LIMIT -1 OFFSET ?")]
	#[case::mysql(DialectKind::Mysql, " LIMIT 18446744073709551615 OFFSET ?")]
	fn test_offset_without_limit(#[case] kind: DialectKind, #[case] expected: &str) {
		let mut writer = SqlWriter::new();
		writer.push("SELECT 1");
		kind.dialect().write_limit_offset(&mut writer, None, Some(3));
		let (sql, params) = writer.finish();
		assert_eq!(sql, format!("SELECT 1{}", expected));
		assert_eq!(params, vec![Value::Int(3)]);
	}

	#[rstest]
	fn test_dialect_kind_names() {
		assert_eq!(DialectKind::Postgres.to_string(), "postgres");
		assert_eq!(DialectKind::default(), DialectKind::Sqlite);
	}
}
