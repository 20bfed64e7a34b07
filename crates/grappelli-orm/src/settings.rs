//! ORM settings
//!
//! Loaded from TOML (a string or a file) and then overridden by environment
//! variables carrying the [`ENV_PREFIX`] prefix:
//!
//! ```toml
//! database_url = "sqlite://members.db"
//! max_connections = 5
//! echo = true
//! ```
//!
//! `GRAPPELLI_ECHO=0` then turns statement echoing back off.

use std::fs;
use std::path::Path;

use grappelli_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Prefix of the environment variables read by
/// [`OrmSettings::with_env_overrides`].
pub const ENV_PREFIX: &str = "GRAPPELLI_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmSettings {
	/// URL of the store; the scheme selects the backend.
	pub database_url: String,
	pub max_connections: u32,
	/// Log executed statements at `info` instead of `debug`.
	pub echo: bool,
	/// Flush dirty instances before a session commits.
	pub flush_on_commit: bool,
}

impl Default for OrmSettings {
	fn default() -> Self {
		Self {
			database_url: "sqlite::memory:".to_string(),
			max_connections: 5,
			echo: false,
			flush_on_commit: true,
		}
	}
}

impl OrmSettings {
	/// Parse settings from TOML. Missing keys keep their defaults.
	///
	/// # Errors
	///
	/// Returns [`Error::Configuration`] when the document is not valid TOML
	/// or a key has the wrong type.
	pub fn from_toml_str(content: &str) -> Result<Self> {
		toml::from_str(content).map_err(|e| Error::Configuration(e.to_string()))
	}

	/// Read settings from a TOML file. A missing file yields the defaults.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		if !path.exists() {
			return Ok(Self::default());
		}
		let content = fs::read_to_string(path)
			.map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))?;
		Self::from_toml_str(&content)
	}

	/// Apply `GRAPPELLI_*` environment variables on top of these settings.
	pub fn with_env_overrides(self) -> Result<Self> {
		let vars = std::env::vars().filter_map(|(key, value)| {
			key.strip_prefix(ENV_PREFIX)
				.map(|name| (name.to_string(), value))
		});
		self.apply_overrides(vars)
	}

	/// Apply `(name, value)` overrides, names matched case-insensitively
	/// without the prefix. Unknown names are ignored.
	///
	/// # Errors
	///
	/// Returns [`Error::Configuration`] when a value cannot be parsed.
	pub fn apply_overrides<I, K, V>(mut self, overrides: I) -> Result<Self>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		for (key, value) in overrides {
			let key = key.as_ref().to_lowercase();
			let value = value.as_ref().trim();
			match key.as_str() {
				"database_url" => self.database_url = value.to_string(),
				"max_connections" => {
					self.max_connections = value.parse().map_err(|_| {
						Error::Configuration(format!("max_connections must be a number, got {}", value))
					})?;
				}
				"echo" => self.echo = parse_flag(&key, value)?,
				"flush_on_commit" => self.flush_on_commit = parse_flag(&key, value)?,
				_ => {}
			}
		}
		Ok(self)
	}
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
	match value.to_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Ok(true),
		"false" | "0" | "no" | "off" => Ok(false),
		_ => Err(Error::Configuration(format!("{} must be a boolean, got {}", key, value))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::io::Write;

	#[rstest]
	fn test_defaults() {
		let settings = OrmSettings::default();
		assert_eq!(settings.database_url, "sqlite::memory:");
		assert_eq!(settings.max_connections, 5);
		assert!(!settings.echo);
		assert!(settings.flush_on_commit);
	}

	#[rstest]
	fn test_partial_toml_keeps_defaults() {
		let settings = OrmSettings::from_toml_str("echo = true\nmax_connections = 2").unwrap();
		assert!(settings.echo);
		assert_eq!(settings.max_connections, 2);
		assert_eq!(settings.database_url, "sqlite::memory:");
	}

	#[rstest]
	fn test_invalid_toml() {
		let err = OrmSettings::from_toml_str("max_connections = \"many\"").unwrap_err();
		assert!(matches!(err, Error::Configuration(_)));
	}

	#[rstest]
	fn test_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "database_url = \"sqlite://members.db\"").unwrap();
		writeln!(file, "flush_on_commit = false").unwrap();

		let settings = OrmSettings::from_file(file.path()).unwrap();

		assert_eq!(settings.database_url, "sqlite://members.db");
		assert!(!settings.flush_on_commit);
	}

	#[rstest]
	fn test_missing_file_yields_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let settings = OrmSettings::from_file(dir.path().join("absent.toml")).unwrap();
		assert_eq!(settings, OrmSettings::default());
	}

	#[rstest]
	#[case("1", true)]
	#[case("on", true)]
	#[case("FALSE", false)]
	fn test_echo_override(#[case] raw: &str, #[case] expected: bool) {
		let settings = OrmSettings::default()
			.apply_overrides([("ECHO", raw)])
			.unwrap();
		assert_eq!(settings.echo, expected);
	}

	#[rstest]
	fn test_overrides_ignore_unknown_and_reject_garbage() {
		let settings = OrmSettings::default()
			.apply_overrides([("DATABASE_URL", "sqlite://other.db"), ("THEME", "dark")])
			.unwrap();
		assert_eq!(settings.database_url, "sqlite://other.db");

		let err = OrmSettings::default()
			.apply_overrides([("MAX_CONNECTIONS", "lots")])
			.unwrap_err();
		assert!(matches!(err, Error::Configuration(_)));
	}
}
