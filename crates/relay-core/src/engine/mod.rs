//! Relay engine that supervises the configured chain adapters.
//!
//! The engine owns the router and every adapter. It wires writers into the
//! router, starts the adapters, and then waits for either a shutdown signal
//! or the first adapter failure. Adapters never restart themselves, so a
//! failure ends the run with an error and leaves recovery to whatever
//! supervises the process.

pub mod lifecycle;

use relay_chain::{ChainError, ChainFailure, ChainService};
use relay_config::Config;
use relay_router::{MessageSink, Router};
use relay_storage::StorageService;
use relay_types::{ChainId, ChainStatus};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("{0}")]
	ChainFailed(ChainFailure),
}

#[derive(Clone)]
pub struct RelayEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) router: Arc<Router>,
	pub(crate) chains: Arc<ChainService>,
}

impl RelayEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		router: Arc<Router>,
		chains: Arc<ChainService>,
	) -> Self {
		Self {
			config,
			storage,
			router,
			chains,
		}
	}

	/// Runs until Ctrl-C or the first adapter failure.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for shutdown signal");
			}
		})
		.await
	}

	/// Runs until `shutdown` completes or an adapter reports a failure.
	///
	/// Every adapter is stopped before this returns, whichever way it ends.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		self.initialize().await;

		let (failure_tx, mut failure_rx) = mpsc::unbounded_channel::<ChainFailure>();
		let sink: Arc<dyn MessageSink> = self.router.clone();
		self.chains.start_all(sink, failure_tx).await?;

		tracing::info!(
			relay = %self.config.relay.id,
			chains = self.chains.chains().len(),
			"Relay running"
		);

		let result = tokio::select! {
			Some(failure) = failure_rx.recv() => {
				tracing::error!(
					chain = %failure.chain_name,
					chain_id = %failure.chain_id,
					kind = ?failure.kind,
					error = %failure.error,
					"Chain failed, shutting down"
				);
				Err(EngineError::ChainFailed(failure))
			}
			_ = shutdown => {
				tracing::info!("Shutdown requested");
				Ok(())
			}
		};

		self.shutdown().await;
		result
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn router(&self) -> &Arc<Router> {
		&self.router
	}

	pub fn chains(&self) -> &Arc<ChainService> {
		&self.chains
	}

	/// Status of every adapter, ordered by chain id.
	pub async fn statuses(&self) -> Vec<ChainStatus> {
		self.chains.statuses().await
	}

	pub async fn status(&self, id: ChainId) -> Option<ChainStatus> {
		match self.chains.get(id) {
			Some(chain) => Some(chain.latest_status().await),
			None => None,
		}
	}
}
