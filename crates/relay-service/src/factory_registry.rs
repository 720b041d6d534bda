//! Registry of every storage and chain implementation compiled into the
//! binary, used to build a relay from configuration.

use relay_chain::ChainFactory;
use relay_config::Config;
use relay_core::{RelayBuilder, RelayEngine, RelayFactories};
use relay_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub chain: HashMap<String, ChainFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			chain: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_chain(&mut self, name: impl Into<String>, factory: ChainFactory) {
		self.chain.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in relay_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in relay_chain::get_all_implementations() {
			tracing::debug!("Registering chain implementation: {}", name);
			registry.register_chain(name, factory);
		}

		registry
	})
}

/// Picks the factories named by `names`, failing on the first unknown one.
fn select<'a, F: Copy>(
	available: &HashMap<String, F>,
	names: impl IntoIterator<Item = &'a String>,
	kind: &str,
) -> Result<HashMap<String, F>, String> {
	let mut selected = HashMap::new();
	for name in names {
		match available.get(name) {
			Some(factory) => {
				selected.insert(name.clone(), *factory);
			},
			None => {
				let mut known: Vec<_> = available.keys().cloned().collect();
				known.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					kind,
					name,
					known.join(", ")
				));
			},
		}
	}
	Ok(selected)
}

pub fn build_relay_from_config(config: Config) -> Result<RelayEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories = select(
		&registry.storage,
		config.storage.implementations.keys(),
		"storage",
	)?;
	let chain_factories = select(
		&registry.chain,
		config.chains.values().map(|c| &c.implementation),
		"chain",
	)?;

	let factories = RelayFactories {
		storage_factories,
		chain_factories,
	};

	Ok(RelayBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_registry_contains_all_implementations() {
		let registry = get_registry();
		assert!(registry.storage.contains_key("memory"));
		assert!(registry.storage.contains_key("file"));
		assert!(registry.chain.contains_key("utxo"));
	}

	#[test]
	fn test_unknown_storage_is_rejected() {
		let config: Config = r#"
[relay]
id = "relay-test"

[storage]
primary = "redis"
[storage.implementations.redis]

[chains.btg]
id = 1
type = "utxo"
endpoint = "http://127.0.0.1:8332"
"#
		.parse()
		.unwrap();

		let err = build_relay_from_config(config).err().unwrap();
		assert_eq!(
			err.to_string(),
			"Unknown storage implementation 'redis'. Available: [file, memory]"
		);
	}
}
