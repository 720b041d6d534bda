//! Configuration for the relay.
//!
//! Configuration is read from TOML. `${VAR}` and `${VAR:-default}` placeholders
//! are substituted from the process environment before parsing, so RPC
//! credentials and wallet passphrases never need to live in the file itself.
//!
//! ## Modular configuration
//!
//! A file may pull in others with `include = ["chains.toml", ...]`. Paths are
//! relative to the including file. Every top-level section must appear in
//! exactly one file, and include cycles are rejected.

mod loader;

use regex::Regex;
use relay_types::ChainId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The default Display dumps the whole input; keep only the message.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub relay: RelayConfig,
	pub storage: StorageConfig,
	/// Chain adapters keyed by their human-readable name.
	pub chains: HashMap<String, ChainConfig>,
	pub api: Option<ApiConfig>,
}

/// Identity of this relay process.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	pub id: String,
}

/// Storage backends available to adapters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Name of the backend used for cursors.
	pub primary: String,
	/// Backend name to its implementation-specific table.
	pub implementations: HashMap<String, toml::Value>,
}

/// One chain adapter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	pub id: ChainId,
	/// Implementation name, e.g. `utxo`.
	#[serde(rename = "type")]
	pub implementation: String,
	/// Node endpoint URL.
	pub endpoint: String,
	/// Implementation-specific options, validated by the implementation.
	#[serde(default = "empty_table")]
	pub opts: toml::Value,
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}

/// HTTP status API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Substitutes `${VAR}` and `${VAR:-default}` placeholders.
///
/// Inputs above 1 MiB are rejected before the regex runs.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut output = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			},
		};
		output.push_str(&input[last..whole.start()]);
		output.push_str(&value);
		last = whole.end();
	}
	output.push_str(&input[last..]);

	Ok(output)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let value = loader::ConfigLoader::new().load(path.as_ref()).await?;
		Self::from_value(value)
	}

	/// Deserializes and validates an already env-resolved TOML value.
	pub(crate) fn from_value(value: toml::Value) -> Result<Self, ConfigError> {
		let config: Config = value.try_into()?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.relay.id.trim().is_empty() {
			return Err(ConfigError::Validation("Relay id cannot be empty".into()));
		}

		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if self.chains.is_empty() {
			return Err(ConfigError::Validation(
				"At least one chain must be configured".into(),
			));
		}

		let mut seen_ids = HashSet::new();
		for (name, chain) in &self.chains {
			if !seen_ids.insert(chain.id) {
				return Err(ConfigError::Validation(format!(
					"Chain '{}' reuses chain id {}",
					name, chain.id
				)));
			}
			if chain.implementation.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Chain '{}' has no type",
					name
				)));
			}
			if !(chain.endpoint.starts_with("http://") || chain.endpoint.starts_with("https://"))
			{
				return Err(ConfigError::Validation(format!(
					"Chain '{}' endpoint must be an http(s) URL, got '{}'",
					name, chain.endpoint
				)));
			}
			if !chain.opts.is_table() {
				return Err(ConfigError::Validation(format!(
					"Chain '{}' opts must be a table",
					name
				)));
			}
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		Self::from_value(toml::from_str(&resolved)?)
	}
}
