//! Assembles a [`RelayEngine`] from configuration and factory maps.
//!
//! Storage backends and chain adapters are looked up by implementation name,
//! so the binary decides which implementations exist and the configuration
//! decides which of them are used.

use crate::engine::RelayEngine;
use relay_chain::{ChainDescriptor, ChainError, ChainInterface, ChainService};
use relay_config::Config;
use relay_router::Router;
use relay_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

pub struct RelayFactories<SF, CF> {
	pub storage_factories: HashMap<String, SF>,
	pub chain_factories: HashMap<String, CF>,
}

pub struct RelayBuilder {
	config: Config,
}

impl RelayBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn build<SF, CF>(self, factories: RelayFactories<SF, CF>) -> Result<RelayEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		CF: Fn(
			&ChainDescriptor,
			&toml::Value,
			Option<Arc<StorageService>>,
		) -> Result<Box<dyn ChainInterface>, ChainError>,
	{
		let primary = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!("Primary storage '{}' is not configured", primary))
			})?;
		let storage_factory = factories
			.storage_factories
			.get(primary)
			.ok_or_else(|| BuilderError::MissingComponent(format!("storage '{}'", primary)))?;
		let backend = storage_factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary, e
			))
		})?;
		tracing::info!(component = "storage", implementation = %primary, "Loaded");
		let storage = Arc::new(StorageService::new(backend));

		let mut configured: Vec<_> = self.config.chains.iter().collect();
		configured.sort_by_key(|(_, chain)| chain.id);

		let mut chains: Vec<Arc<dyn ChainInterface>> = Vec::with_capacity(configured.len());
		for (name, chain_config) in configured {
			let factory = factories
				.chain_factories
				.get(&chain_config.implementation)
				.ok_or_else(|| {
					let mut available: Vec<_> =
						factories.chain_factories.keys().cloned().collect();
					available.sort();
					BuilderError::Config(format!(
						"Unknown chain type '{}' for chain '{}'. Available: [{}]",
						chain_config.implementation,
						name,
						available.join(", ")
					))
				})?;

			let descriptor = ChainDescriptor {
				id: chain_config.id,
				name: name.clone(),
				endpoint: chain_config.endpoint.clone(),
			};
			let chain = factory(&descriptor, &chain_config.opts, Some(storage.clone()))
				.map_err(|e| {
					tracing::error!(
						component = "chain",
						chain = %name,
						implementation = %chain_config.implementation,
						error = %e,
						"Failed to create chain adapter"
					);
					BuilderError::Config(format!("Failed to create chain '{}': {}", name, e))
				})?;
			tracing::info!(
				component = "chain",
				chain = %name,
				chain_id = %chain_config.id,
				implementation = %chain_config.implementation,
				"Loaded"
			);
			chains.push(Arc::from(chain));
		}

		Ok(RelayEngine::new(
			self.config,
			storage,
			Arc::new(Router::new()),
			Arc::new(ChainService::new(chains)),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relay_chain::ChainFactory;
	use relay_storage::StorageFactory;

	const CONFIG: &str = r#"
[relay]
id = "relay-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[chains.btg]
id = 2
type = "utxo"
endpoint = "http://127.0.0.1:8332"
[chains.btg.opts]
rpc_user = "user"
rpc_password = "pass"
watch_addresses = ["addr1"]
[chains.btg.opts.destination]
chain_id = 1
resource_id = "0x0000000000000000000000000000000000000000000000000000000000000001"
recipient = "0xabcd"

[chains.ltc]
id = 1
type = "utxo"
endpoint = "http://127.0.0.1:9332"
[chains.ltc.opts]
rpc_user = "user"
rpc_password = "pass"
watch_addresses = ["addr2"]
[chains.ltc.opts.destination]
chain_id = 2
resource_id = "0x0000000000000000000000000000000000000000000000000000000000000001"
recipient = "0xabcd"
"#;

	fn factories() -> RelayFactories<StorageFactory, ChainFactory> {
		RelayFactories {
			storage_factories: relay_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			chain_factories: relay_chain::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_orders_chains_by_id() {
		let config: Config = CONFIG.parse().unwrap();
		let engine = RelayBuilder::new(config).build(factories()).unwrap();

		let names: Vec<_> = engine
			.chains()
			.chains()
			.iter()
			.map(|c| c.name().to_string())
			.collect();
		assert_eq!(names, vec!["ltc", "btg"]);
		assert_eq!(engine.config().relay.id, "relay-test");
	}

	#[tokio::test]
	async fn test_unknown_chain_type_is_rejected() {
		let config: Config = CONFIG.replace("type = \"utxo\"", "type = \"evm\"").parse().unwrap();
		match RelayBuilder::new(config).build(factories()) {
			Err(BuilderError::Config(message)) => {
				assert!(message.contains("Unknown chain type 'evm'"));
				assert!(message.contains("Available: [utxo]"));
			},
			other => panic!("expected config error, got {:?}", other.err()),
		}
	}

	#[tokio::test]
	async fn test_missing_storage_factory() {
		let config: Config = CONFIG.parse().unwrap();
		let mut factories = factories();
		factories.storage_factories.remove("memory");
		assert!(matches!(
			RelayBuilder::new(config).build(factories),
			Err(BuilderError::MissingComponent(_))
		));
	}

	#[tokio::test]
	async fn test_chain_factory_error_is_reported() {
		let config: Config = CONFIG
			.replace("watch_addresses = [\"addr1\"]", "watch_addresses = []")
			.parse()
			.unwrap();
		let result = RelayBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(m)) if m.contains("'btg'")));
	}
}
