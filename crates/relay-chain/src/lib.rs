//! Chain adapters for the relay.
//!
//! An adapter watches one source chain and turns deposits into transfer
//! messages for the router, and registers a writer that receives messages
//! bound for its chain. Adapters are pluggable: each implementation exposes
//! a factory keyed by the `type` name used in configuration.

use async_trait::async_trait;
use relay_router::{MessageSink, WriterInterface};
use relay_storage::StorageService;
use relay_types::{ChainId, ChainStatus, ConfigSchema, ImplementationRegistry};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod implementations {
	pub mod utxo;
}

/// Errors raised by adapter construction and lifecycle calls.
#[derive(Debug, Error)]
pub enum ChainError {
	#[error("Connection error: {0}")]
	Connection(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("Already running")]
	AlreadyRunning,
}

/// Why a polling task terminated on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
	/// The ledger failed `attempts` fetches in a row.
	RetriesExhausted { attempts: u32 },
	/// The polling task panicked.
	Panicked,
}

/// Report of an adapter whose polling task has terminated on its own.
///
/// The adapter does not restart itself; whoever owns the receiving end
/// decides what happens next. `error` is the rendered cause for logs.
#[derive(Debug, Clone, Error)]
#[error("Chain {chain_name} ({chain_id}) failed: {error}")]
pub struct ChainFailure {
	pub chain_id: ChainId,
	pub chain_name: String,
	pub kind: FailureKind,
	pub error: String,
}

/// Identity and endpoint shared by every adapter type.
#[derive(Debug, Clone)]
pub struct ChainDescriptor {
	pub id: ChainId,
	pub name: String,
	pub endpoint: String,
}

/// Lifecycle surface of a chain adapter.
#[async_trait]
pub trait ChainInterface: Send + Sync {
	fn id(&self) -> ChainId;

	fn name(&self) -> &str;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Writer to register with the router for this chain id.
	fn writer(&self) -> Arc<dyn WriterInterface>;

	/// Spawns the polling task and returns immediately.
	///
	/// Messages go to `sink`. If the task ends on its own, a
	/// [`ChainFailure`] is sent on `failures`.
	async fn start(
		&self,
		sink: Arc<dyn MessageSink>,
		failures: mpsc::UnboundedSender<ChainFailure>,
	) -> Result<(), ChainError>;

	/// Signals the polling task to stop without waiting for it.
	async fn stop(&self) -> Result<(), ChainError>;

	async fn latest_status(&self) -> ChainStatus;
}

/// Builds an adapter from its descriptor and `opts` table. Storage is the
/// primary backend, used by adapters that persist state.
pub type ChainFactory = fn(
	&ChainDescriptor,
	&toml::Value,
	Option<Arc<StorageService>>,
) -> Result<Box<dyn ChainInterface>, ChainError>;

pub trait ChainRegistry: ImplementationRegistry<Factory = ChainFactory> {}

/// Returns every adapter type this crate provides.
pub fn get_all_implementations() -> Vec<(&'static str, ChainFactory)> {
	use implementations::utxo;

	vec![(utxo::Registry::NAME, utxo::Registry::factory())]
}

/// The set of adapters run by one relay.
pub struct ChainService {
	chains: Vec<Arc<dyn ChainInterface>>,
}

impl ChainService {
	pub fn new(chains: Vec<Arc<dyn ChainInterface>>) -> Self {
		Self { chains }
	}

	pub fn chains(&self) -> &[Arc<dyn ChainInterface>] {
		&self.chains
	}

	pub fn get(&self, id: ChainId) -> Option<&Arc<dyn ChainInterface>> {
		self.chains.iter().find(|chain| chain.id() == id)
	}

	/// Starts every adapter. If one fails to start, those already started
	/// are stopped again.
	pub async fn start_all(
		&self,
		sink: Arc<dyn MessageSink>,
		failures: mpsc::UnboundedSender<ChainFailure>,
	) -> Result<(), ChainError> {
		for (i, chain) in self.chains.iter().enumerate() {
			if let Err(e) = chain.start(sink.clone(), failures.clone()).await {
				tracing::error!(chain = %chain.name(), error = %e, "Failed to start chain");
				for started in &self.chains[..i] {
					let _ = started.stop().await;
				}
				return Err(e);
			}
		}
		Ok(())
	}

	pub async fn stop_all(&self) {
		let stops = self.chains.iter().map(|chain| async move {
			if let Err(e) = chain.stop().await {
				tracing::warn!(chain = %chain.name(), error = %e, "Failed to stop chain");
			}
		});
		futures::future::join_all(stops).await;
	}

	/// Status of every adapter, ordered by chain id.
	pub async fn statuses(&self) -> Vec<ChainStatus> {
		let mut statuses =
			futures::future::join_all(self.chains.iter().map(|c| c.latest_status())).await;
		statuses.sort_by_key(|s| s.chain_id);
		statuses
	}
}
