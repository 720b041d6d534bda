//! Optional persistence of the tracked set and nonce counter.

use relay_storage::{StorageError, StorageService};
use relay_types::{ChainId, StorageKey, UnspentOutput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What an adapter needs to resume without re-reporting known deposits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
	pub outputs: Vec<UnspentOutput>,
	pub next_nonce: u64,
}

/// Loads and saves one chain's cursor through the storage service.
#[derive(Clone)]
pub struct CursorStore {
	storage: Arc<StorageService>,
	chain_id: ChainId,
}

impl CursorStore {
	pub fn new(storage: Arc<StorageService>, chain_id: ChainId) -> Self {
		Self { storage, chain_id }
	}

	pub async fn load(&self) -> Result<Option<Cursor>, StorageError> {
		self.storage
			.retrieve_optional(StorageKey::Cursors, &self.chain_id.to_string())
			.await
	}

	pub async fn save(&self, cursor: &Cursor) -> Result<(), StorageError> {
		self.storage
			.store(StorageKey::Cursors, &self.chain_id.to_string(), cursor)
			.await
	}
}
