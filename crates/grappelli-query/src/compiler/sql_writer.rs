//! SQL Writer helper for constructing SQL strings
//!
//! This module provides `SqlWriter` type which helps build SQL strings
//! with proper spacing, placeholder management and parameter collection.
//!
use grappelli_core::Value;

/// SQL Writer for constructing SQL strings
///
/// Parameters are collected in the order their placeholders are written, so
/// a nested statement rendered through the same writer keeps the textual
/// order of the final SQL.
///
/// # Examples
///
/// ```rust,ignore
/// use grappelli_query::compiler::SqlWriter;
///
/// let mut writer = SqlWriter::new();
/// writer.push("SELECT");
/// writer.push_space();
/// writer.push_identifier("id", |s| format!("\"{}\"", s));
/// writer.push_keyword("FROM");
/// writer.push_space();
/// writer.push_identifier("member", |s| format!("\"{}\"", s));
///
/// let (sql, params) = writer.finish();
/// // sql: SELECT "id" FROM "member"
/// ```
#[derive(Debug, Clone)]
pub struct SqlWriter {
	sql: String,
	values: Vec<Value>,
	/// Next parameter index (1-based)
	param_index: usize,
}

impl SqlWriter {
	pub fn new() -> Self {
		Self {
			sql: String::new(),
			values: Vec::new(),
			param_index: 1,
		}
	}

	pub fn push(&mut self, s: &str) {
		self.sql.push_str(s);
	}

	/// Push a space unless the SQL is empty or already ends with one.
	pub fn push_space(&mut self) {
		if !self.sql.is_empty() && !self.sql.ends_with(' ') && !self.sql.ends_with('(') {
			self.sql.push(' ');
		}
	}

	pub fn push_identifier<F>(&mut self, ident: &str, escape_fn: F)
	where
		F: FnOnce(&str) -> String,
	{
		self.sql.push_str(&escape_fn(ident));
	}

	pub fn push_comma(&mut self) {
		self.sql.push_str(", ");
	}

	/// Push a value placeholder and collect the value.
	///
	/// NULL is written inline and consumes no parameter; `None` is returned
	/// in that case, the parameter index otherwise.
	pub fn push_value<F>(&mut self, value: Value, format_fn: F) -> Option<usize>
	where
		F: FnOnce(usize) -> String,
	{
		if value.is_null() {
			self.sql.push_str("NULL");
			return None;
		}

		let index = self.param_index;
		self.sql.push_str(&format_fn(index));
		self.values.push(value);
		self.param_index += 1;
		Some(index)
	}

	/// Push a keyword (with automatic spacing)
	pub fn push_keyword(&mut self, keyword: &str) {
		self.push_space();
		self.sql.push_str(keyword);
	}

	#[cfg(test)]
	fn sql(&self) -> &str {
		&self.sql
	}

	#[cfg(test)]
	fn values(&self) -> &[Value] {
		&self.values
	}

	#[cfg(test)]
	fn param_index(&self) -> usize {
		self.param_index
	}

	/// Consume writer and return (SQL, parameters)
	pub fn finish(self) -> (String, Vec<Value>) {
		(self.sql, self.values)
	}

	/// Push a list of items with a separator
	pub fn push_list<I, T, F>(&mut self, items: I, separator: &str, mut f: F)
	where
		I: IntoIterator<Item = T>,
		F: FnMut(&mut Self, T),
	{
		let mut first = true;
		for item in items {
			if !first {
				self.sql.push_str(separator);
			}
			f(self, item);
			first = false;
		}
	}
}

impl Default for SqlWriter {
	fn default() -> Self {
		Self::new()
	}
}
