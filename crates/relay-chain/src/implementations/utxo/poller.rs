//! The background task of a UTXO adapter.
//!
//! Each cycle fetches the unspent outputs of the watched addresses, diffs
//! them against the tracked set, translates new outputs into transfer
//! messages and hands those to the message sink. Failed fetches are retried
//! after `retry_interval`; after `retry_limit` consecutive failures the task
//! ends with [`PollingError::RetriesExhausted`].

use super::cursor::{Cursor, CursorStore};
use super::ledger::{LedgerError, LedgerInterface};
use super::tracker::UtxoSetTracker;
use super::translator::DepositTranslator;
use crate::FailureKind;
use chrono::Utc;
use relay_router::MessageSink;
use relay_storage::StorageError;
use relay_types::{ChainId, ChainStatus, DepositEvent, Nonce, PollerState, UnspentOutput};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum PollingError {
	#[error("Snapshot fetch failed {attempts} times in a row: {last_error}")]
	RetriesExhausted {
		attempts: u32,
		#[source]
		last_error: LedgerError,
	},
}

impl PollingError {
	pub fn kind(&self) -> FailureKind {
		match self {
			PollingError::RetriesExhausted { attempts, .. } => FailureKind::RetriesExhausted {
				attempts: *attempts,
			},
		}
	}
}

/// Timing and query parameters of the polling loop.
#[derive(Debug, Clone)]
pub struct PollerSettings {
	pub addresses: Vec<String>,
	pub min_confirmations: u32,
	pub max_confirmations: u32,
	pub interval: Duration,
	pub retry_interval: Duration,
	/// Consecutive failed fetches tolerated before giving up. At least 1.
	pub retry_limit: u32,
}

/// Outcome of one successful cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
	pub detected: u64,
	pub routed: u64,
	pub failed: u64,
	pub last_nonce: Option<Nonce>,
}

pub struct UtxoPoller {
	chain_id: ChainId,
	ledger: Arc<dyn LedgerInterface>,
	settings: PollerSettings,
	tracker: UtxoSetTracker,
	translator: DepositTranslator,
	sink: Arc<dyn MessageSink>,
	cancel: CancellationToken,
	status: Arc<RwLock<ChainStatus>>,
	cursor: Option<CursorStore>,
}

impl UtxoPoller {
	pub fn new(
		chain_id: ChainId,
		ledger: Arc<dyn LedgerInterface>,
		settings: PollerSettings,
		tracker: UtxoSetTracker,
		translator: DepositTranslator,
		sink: Arc<dyn MessageSink>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			chain_id,
			ledger,
			settings,
			tracker,
			translator,
			sink,
			cancel,
			status: Arc::new(RwLock::new(ChainStatus::new(chain_id, chain_id.to_string()))),
			cursor: None,
		}
	}

	/// Publishes progress into `status` instead of a private snapshot.
	pub fn with_status(mut self, status: Arc<RwLock<ChainStatus>>) -> Self {
		self.status = status;
		self
	}

	/// Saves the cursor before routing every cycle that changed it.
	pub fn with_cursor(mut self, cursor: CursorStore) -> Self {
		self.cursor = Some(cursor);
		self
	}

	/// Runs until cancelled (`Ok`) or until the retry budget is spent.
	pub async fn run(mut self) -> Result<(), PollingError> {
		let limit = self.settings.retry_limit.max(1);
		let mut remaining = limit;
		self.set_state(PollerState::Polling).await;

		loop {
			if self.cancel.is_cancelled() {
				break;
			}

			let fetched = self
				.ledger
				.list_unspent(
					self.settings.min_confirmations,
					self.settings.max_confirmations,
					&self.settings.addresses,
				)
				.await;

			// A stop that arrived during the fetch abandons its result.
			if self.cancel.is_cancelled() {
				break;
			}

			match fetched {
				Ok(snapshot) => {
					remaining = limit;
					let report = self.process(snapshot).await;
					self.record_success(&report).await;
					if !self.pause(self.settings.interval).await {
						break;
					}
				},
				Err(e) => {
					remaining -= 1;
					if remaining == 0 {
						tracing::error!(
							chain_id = %self.chain_id,
							attempts = limit,
							error = %e,
							"Snapshot fetch retries exhausted, polling stopped"
						);
						self.record_failure(PollerState::Failed).await;
						return Err(PollingError::RetriesExhausted {
							attempts: limit,
							last_error: e,
						});
					}

					tracing::warn!(
						chain_id = %self.chain_id,
						remaining,
						error = %e,
						"Snapshot fetch failed, retrying"
					);
					self.record_failure(PollerState::Backoff { remaining }).await;
					if !self.pause(self.settings.retry_interval).await {
						break;
					}
				},
			}
		}

		tracing::info!(chain_id = %self.chain_id, "Polling stopped");
		self.set_state(PollerState::Stopped).await;
		Ok(())
	}

	/// Diffs, translates and forwards one snapshot.
	///
	/// With a cursor, the new tracked set and the nonces issued for this
	/// batch are saved before the first message is sent. If that save fails
	/// the batch is dropped and the tracker rolls back, so the same outputs
	/// come up again next cycle under fresh nonces.
	async fn process(&mut self, snapshot: Vec<UnspentOutput>) -> CycleReport {
		let previous = self.cursor.as_ref().map(|_| self.tracker.clone());
		let tracked_before = self.tracker.len();
		let added = self.tracker.diff(snapshot);
		let mut report = CycleReport::default();

		let mut batch = Vec::with_capacity(added.len());
		for output in &added {
			let event = DepositEvent::from(output);
			match self.translator.translate(&event) {
				Ok(message) => batch.push((event, message)),
				Err(e) => {
					tracing::error!(
						output = %event.output_id,
						address = %event.address,
						error = %e,
						"Failed to translate deposit"
					);
					report.failed += 1;
				},
			}
		}

		let changed = !added.is_empty() || self.tracker.len() != tracked_before;
		if changed {
			if let Err(e) = self.save_cursor().await {
				if let Some(previous) = previous {
					self.tracker = previous;
				}
				tracing::error!(
					chain_id = %self.chain_id,
					deferred = batch.len(),
					error = %e,
					"Failed to save cursor, deferring deposits"
				);
				return CycleReport::default();
			}
		}

		report.detected = added.len() as u64;
		for (event, message) in batch {
			tracing::info!(
				output = %event.output_id,
				address = %event.address,
				amount = event.amount,
				"Deposit detected"
			);

			let nonce = message.nonce;
			let destination = message.destination;
			report.last_nonce = Some(nonce);
			match self.sink.send(message).await {
				Ok(()) => {
					report.routed += 1;
					tracing::info!(
						output = %event.output_id,
						nonce = %nonce,
						destination = %destination,
						"Transfer routed"
					);
				},
				Err(e) => {
					report.failed += 1;
					tracing::error!(
						output = %event.output_id,
						address = %event.address,
						nonce = %nonce,
						error = %e,
						"Failed to route transfer"
					);
				},
			}
		}

		report
	}

	async fn save_cursor(&self) -> Result<(), StorageError> {
		let Some(store) = &self.cursor else {
			return Ok(());
		};
		let cursor = Cursor {
			outputs: self.tracker.outputs(),
			next_nonce: self.translator.next_nonce(),
		};
		store.save(&cursor).await
	}

	/// Waits for `duration` unless cancelled first. Returns false on cancel.
	async fn pause(&self, duration: Duration) -> bool {
		tokio::select! {
			_ = self.cancel.cancelled() => false,
			_ = tokio::time::sleep(duration) => true,
		}
	}

	async fn set_state(&self, state: PollerState) {
		self.status.write().await.state = state;
	}

	async fn record_success(&self, report: &CycleReport) {
		let mut status = self.status.write().await;
		status.state = PollerState::Polling;
		status.last_poll_at = Some(Utc::now());
		status.tracked_outputs = self.tracker.len();
		status.deposits_detected += report.detected;
		status.messages_routed += report.routed;
		status.routing_failures += report.failed;
		status.consecutive_failures = 0;
		if report.last_nonce.is_some() {
			status.last_nonce = report.last_nonce;
		}
	}

	async fn record_failure(&self, state: PollerState) {
		let mut status = self.status.write().await;
		status.state = state;
		status.consecutive_failures += 1;
	}
}
