//! Destination side of the UTXO adapter.
//!
//! Releasing funds on a UTXO chain (building and voting on proposals) is not
//! implemented. The writer acknowledges and records inbound transfers so the
//! router has a registered destination, and enforces the `(source, nonce)`
//! idempotency contract over a bounded window of recent nonces per source.

use async_trait::async_trait;
use relay_router::{WriterError, WriterInterface};
use relay_types::{ChainId, TransferMessage};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Mutex;

/// Nonces remembered per source chain.
pub const DEFAULT_WINDOW: usize = 4096;

/// Recently accepted nonces from one source.
///
/// Holds at most `window` nonces. Anything at or below `floor` has been
/// evicted and is treated as already accepted, which holds because a
/// source issues nonces in increasing order.
#[derive(Default)]
struct SourceWindow {
	floor: Option<u64>,
	recent: BTreeSet<u64>,
}

impl SourceWindow {
	/// Returns false for a nonce seen before or older than the window.
	fn accept(&mut self, nonce: u64, window: usize) -> bool {
		if self.floor.is_some_and(|floor| nonce <= floor) || !self.recent.insert(nonce) {
			return false;
		}
		while self.recent.len() > window {
			self.floor = self.recent.pop_first();
		}
		true
	}
}

#[derive(Default)]
struct Accepted {
	sources: HashMap<ChainId, SourceWindow>,
	total: u64,
}

pub struct UtxoWriter {
	chain_id: ChainId,
	window: usize,
	accepted: Mutex<Accepted>,
}

impl UtxoWriter {
	pub fn new(chain_id: ChainId) -> Self {
		Self::with_window(chain_id, DEFAULT_WINDOW)
	}

	pub fn with_window(chain_id: ChainId, window: usize) -> Self {
		Self {
			chain_id,
			window: window.max(1),
			accepted: Mutex::new(Accepted::default()),
		}
	}

	/// Number of distinct transfers accepted so far.
	pub async fn accepted_count(&self) -> u64 {
		self.accepted.lock().await.total
	}
}

#[async_trait]
impl WriterInterface for UtxoWriter {
	async fn resolve_message(&self, message: TransferMessage) -> Result<(), WriterError> {
		if message.destination != self.chain_id {
			return Err(WriterError::Rejected(format!(
				"message for chain {} delivered to chain {}",
				message.destination, self.chain_id
			)));
		}

		{
			let mut accepted = self.accepted.lock().await;
			let fresh = accepted
				.sources
				.entry(message.source)
				.or_default()
				.accept(message.nonce.0, self.window);
			if !fresh {
				tracing::debug!(
					source = %message.source,
					nonce = %message.nonce,
					"Duplicate transfer acknowledged"
				);
				return Ok(());
			}
			accepted.total += 1;
		}

		tracing::info!(
			source = %message.source,
			nonce = %message.nonce,
			amount = message.amount,
			resource_id = %message.resource_id,
			"Accepted inbound transfer"
		);
		Ok(())
	}
}
