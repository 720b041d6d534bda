//! Multi-file loading with `include` directives.

use crate::{resolve_env_vars, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Walks a configuration file and everything it includes, merging the
/// top-level sections into one table.
pub(crate) struct ConfigLoader {
	/// Canonical paths already read, for cycle detection.
	visited: HashSet<PathBuf>,
	/// Which file defined each top-level section.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub(crate) fn new() -> Self {
		Self {
			visited: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads `path` and its includes, depth first.
	pub(crate) async fn load(&mut self, path: &Path) -> Result<toml::Value, ConfigError> {
		let mut merged = toml::Table::new();
		let mut pending = vec![path.to_path_buf()];

		while let Some(next) = pending.pop() {
			let (table, includes) = self.read_file(&next).await?;
			self.merge(&mut merged, table, &next)?;

			let base = next.parent().unwrap_or_else(|| Path::new("."));
			// Reverse so the first include listed is processed first.
			for include in includes.into_iter().rev() {
				pending.push(if include.is_absolute() {
					include
				} else {
					base.join(include)
				});
			}
		}

		Ok(toml::Value::Table(merged))
	}

	/// Reads one file, resolves env vars and splits off its includes.
	async fn read_file(
		&mut self,
		path: &Path,
	) -> Result<(toml::Table, Vec<PathBuf>), ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;
		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(&canonical).await?;
		let mut table: toml::Table = toml::from_str(&resolve_env_vars(&content)?)?;
		let includes = match table.remove("include") {
			None => Vec::new(),
			Some(toml::Value::String(s)) => vec![PathBuf::from(s)],
			Some(toml::Value::Array(items)) => items
				.into_iter()
				.map(|item| match item {
					toml::Value::String(s) => Ok(PathBuf::from(s)),
					_ => Err(ConfigError::Validation(
						"Include array must contain only strings".into(),
					)),
				})
				.collect::<Result<_, _>>()?,
			Some(_) => {
				return Err(ConfigError::Validation(
					"Include must be a string or array of strings".into(),
				))
			},
		};

		Ok((table, includes))
	}

	fn merge(
		&mut self,
		merged: &mut toml::Table,
		table: toml::Table,
		source: &Path,
	) -> Result<(), ConfigError> {
		for (key, value) in table {
			if let Some(existing) = self.section_sources.get(&key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}",
					key,
					existing.display(),
					source.display()
				)));
			}
			self.section_sources.insert(key.clone(), source.to_path_buf());
			merged.insert(key, value);
		}
		Ok(())
	}
}
