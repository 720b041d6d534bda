//! Health snapshots exposed by chain adapters.

use crate::{ChainId, Nonce};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an adapter's polling task currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PollerState {
	/// Not started yet.
	Idle,
	/// Fetching and processing snapshots normally.
	Polling,
	/// The last fetch failed; `remaining` retries are left.
	Backoff { remaining: u32 },
	/// Stopped on request.
	Stopped,
	/// Retries exhausted; the adapter must be restarted externally.
	Failed,
}

/// Point-in-time view of one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
	pub chain_id: ChainId,
	pub name: String,
	pub state: PollerState,
	/// Time of the last successful snapshot fetch.
	pub last_poll_at: Option<DateTime<Utc>>,
	/// Outputs currently held by the tracker.
	pub tracked_outputs: usize,
	pub deposits_detected: u64,
	pub messages_routed: u64,
	pub routing_failures: u64,
	pub consecutive_failures: u32,
	pub last_nonce: Option<Nonce>,
}

impl ChainStatus {
	pub fn new(chain_id: ChainId, name: impl Into<String>) -> Self {
		Self {
			chain_id,
			name: name.into(),
			state: PollerState::Idle,
			last_poll_at: None,
			tracked_outputs: 0,
			deposits_detected: 0,
			messages_routed: 0,
			routing_failures: 0,
			consecutive_failures: 0,
			last_nonce: None,
		}
	}

	/// True while the polling task is expected to be alive.
	pub fn is_running(&self) -> bool {
		matches!(
			self.state,
			PollerState::Polling | PollerState::Backoff { .. }
		)
	}
}
