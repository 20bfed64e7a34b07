//! `INSERT` and `UPDATE` for the unit of work.

use grappelli_core::{Error, Result, Value};

use super::{CompiledStatement, Dialect, DialectKind, SqlWriter};
use crate::metadata::EntityMetadata;

/// `INSERT INTO table (columns) VALUES (params)`, optionally returning the
/// generated primary key on dialects that support it.
pub fn compile_insert(
	dialect: &dyn Dialect,
	metadata: &EntityMetadata,
	assignments: &[(String, Value)],
	returning: bool,
) -> CompiledStatement {
	let mut writer = SqlWriter::new();
	writer.push("INSERT INTO ");
	writer.push_identifier(metadata.table(), |s| dialect.escape_identifier(s));

	if assignments.is_empty() {
		writer.push(match dialect.kind() {
			DialectKind::Mysql => " () VALUES ()",
			_ => " DEFAULT VALUES",
		});
	} else {
		writer.push(" (");
		writer.push_list(assignments, ", ", |w, (column, _)| {
			w.push_identifier(column, |s| dialect.escape_identifier(s));
		});
		writer.push(") VALUES (");
		writer.push_list(assignments, ", ", |w, (_, value)| {
			w.push_value(value.clone(), |i| dialect.placeholder(i));
		});
		writer.push(")");
	}

	if returning && dialect.supports_returning() {
		writer.push_keyword("RETURNING");
		writer.push_space();
		writer.push_identifier(metadata.primary_key().column(), |s| dialect.escape_identifier(s));
	}

	let (sql, params) = writer.finish();
	CompiledStatement::new(sql, params)
}

/// `UPDATE table SET column = param, ... WHERE pk = param`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when there is nothing to assign.
pub fn compile_update(
	dialect: &dyn Dialect,
	metadata: &EntityMetadata,
	assignments: &[(String, Value)],
	id: Value,
) -> Result<CompiledStatement> {
	if assignments.is_empty() {
		return Err(Error::InvalidArgument(format!(
			"update of {} assigns no column",
			metadata.name()
		)));
	}
	let mut writer = SqlWriter::new();
	writer.push("UPDATE ");
	writer.push_identifier(metadata.table(), |s| dialect.escape_identifier(s));
	writer.push_keyword("SET");
	writer.push_space();
	writer.push_list(assignments, ", ", |w, (column, value)| {
		w.push_identifier(column, |s| dialect.escape_identifier(s));
		w.push(" = ");
		w.push_value(value.clone(), |i| dialect.placeholder(i));
	});
	writer.push_keyword("WHERE");
	writer.push_space();
	writer.push_identifier(metadata.primary_key().column(), |s| dialect.escape_identifier(s));
	writer.push(" = ");
	writer.push_value(id, |i| dialect.placeholder(i));

	let (sql, params) = writer.finish();
	Ok(CompiledStatement::new(sql, params))
}
