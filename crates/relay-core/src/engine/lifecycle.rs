//! Startup and shutdown steps around the engine's main wait.

use super::RelayEngine;

impl RelayEngine {
	/// Registers every adapter's writer with the router so messages can be
	/// routed to a chain as soon as any adapter starts polling.
	pub async fn initialize(&self) {
		tracing::info!("Initializing relay engine");
		for chain in self.chains.chains() {
			self.router.listen(chain.id(), chain.writer()).await;
		}
	}

	pub async fn shutdown(&self) {
		tracing::info!("Shutting down relay engine");
		self.chains.stop_all().await;
	}
}
