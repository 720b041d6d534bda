//! Adapter for UTXO ledgers exposing a bitcoind-compatible RPC.
//!
//! Deposits are detected by polling `listunspent` for a fixed set of watched
//! addresses: an outpoint that was not present in the previous snapshot is a
//! new deposit and becomes one transfer message.

pub mod cursor;
pub mod ledger;
pub mod poller;
pub mod tracker;
pub mod translator;
pub mod writer;

use crate::{ChainDescriptor, ChainError, ChainFailure, ChainInterface, FailureKind};
use futures::FutureExt;
use async_trait::async_trait;
use cursor::CursorStore;
use ledger::{BitcoindClient, LedgerInterface};
use poller::{PollerSettings, UtxoPoller};
use relay_router::{MessageSink, WriterInterface};
use relay_storage::StorageService;
use relay_types::{
	ChainId, ChainStatus, ConfigSchema, Field, FieldType, ImplementationRegistry, PollerState,
	ResourceId, Route, Schema, SecretString, ValidationError,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracker::UtxoSetTracker;
use translator::{DepositTranslator, NonceCounter, RoutePolicy, TranslateError};
use writer::UtxoWriter;

/// `opts` table of a `type = "utxo"` chain.
#[derive(Debug, Deserialize)]
struct UtxoOptions {
	rpc_user: String,
	rpc_password: SecretString,
	wallet: Option<String>,
	wallet_passphrase: Option<SecretString>,
	#[serde(default = "default_unlock_timeout_secs")]
	unlock_timeout_secs: u64,
	watch_addresses: Vec<String>,
	#[serde(default = "default_min_confirmations")]
	min_confirmations: u32,
	#[serde(default = "default_max_confirmations")]
	max_confirmations: u32,
	#[serde(default = "default_interval_ms")]
	polling_interval_ms: u64,
	#[serde(default = "default_interval_ms")]
	retry_interval_ms: u64,
	#[serde(default = "default_retry_limit")]
	retry_limit: u32,
	#[serde(default = "default_request_timeout_secs")]
	request_timeout_secs: u64,
	#[serde(default)]
	persist_cursor: bool,
	destination: Option<Route>,
	#[serde(default)]
	routes: Vec<AddressRoute>,
}

#[derive(Debug, Deserialize)]
struct AddressRoute {
	address: String,
	chain_id: ChainId,
	resource_id: ResourceId,
	#[serde(with = "relay_types::message::hex_bytes")]
	recipient: Vec<u8>,
}

fn configuration_error(chain: &str, error: TranslateError) -> ChainError {
	match error {
		TranslateError::Configuration(message) => {
			ChainError::Configuration(format!("Chain '{}': {}", chain, message))
		},
		other => ChainError::Configuration(format!("Chain '{}': {}", chain, other)),
	}
}

fn default_unlock_timeout_secs() -> u64 {
	60
}

fn default_min_confirmations() -> u32 {
	1
}

fn default_max_confirmations() -> u32 {
	9_999_999
}

fn default_interval_ms() -> u64 {
	1000
}

fn default_retry_limit() -> u32 {
	5
}

fn default_request_timeout_secs() -> u64 {
	30
}

fn route_fields() -> Vec<Field> {
	vec![
		Field::new(
			"chain_id",
			FieldType::Integer {
				min: Some(0),
				max: Some(u8::MAX as i64),
			},
		),
		Field::new("resource_id", FieldType::String),
		Field::new("recipient", FieldType::String),
	]
}

fn non_empty_string(value: &toml::Value) -> Result<(), String> {
	match value.as_str() {
		Some(s) if !s.trim().is_empty() => Ok(()),
		_ => Err("must not be empty".to_string()),
	}
}

/// Schema of the `opts` table.
pub struct UtxoChainSchema;

impl ConfigSchema for UtxoChainSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let positive = |max: Option<i64>| FieldType::Integer { min: Some(1), max };
		let mut address_route = route_fields();
		address_route.push(Field::new("address", FieldType::String).with_validator(non_empty_string));

		let schema = Schema::new(
			vec![
				Field::new("rpc_user", FieldType::String),
				Field::new("rpc_password", FieldType::String),
				Field::new("watch_addresses", FieldType::Array(Box::new(FieldType::String)))
					.with_validator(|v| match v.as_array() {
						Some(items) if !items.is_empty() => Ok(()),
						_ => Err("at least one address is required".to_string()),
					}),
			],
			vec![
				Field::new("wallet", FieldType::String).with_validator(non_empty_string),
				Field::new("wallet_passphrase", FieldType::String),
				Field::new("unlock_timeout_secs", positive(None)),
				Field::new(
					"min_confirmations",
					FieldType::Integer {
						min: Some(0),
						max: Some(u32::MAX as i64),
					},
				),
				Field::new("max_confirmations", positive(Some(u32::MAX as i64))),
				Field::new("polling_interval_ms", positive(None)),
				Field::new(
					"retry_interval_ms",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("retry_limit", positive(Some(u32::MAX as i64))),
				Field::new("request_timeout_secs", positive(None)),
				Field::new("persist_cursor", FieldType::Boolean),
				Field::new(
					"destination",
					FieldType::Table(Schema::new(route_fields(), vec![])),
				),
				Field::new(
					"routes",
					FieldType::Array(Box::new(FieldType::Table(Schema::new(address_route, vec![])))),
				),
			],
		);

		schema.validate(config)
	}
}

struct RunningTask {
	cancel: CancellationToken,
	handle: JoinHandle<()>,
}

/// A UTXO chain adapter.
///
/// The tracked set is rebuilt on every start (or seeded from the cursor);
/// the nonce counter lives as long as the adapter.
pub struct UtxoChain {
	id: ChainId,
	name: String,
	ledger: Arc<dyn LedgerInterface>,
	settings: PollerSettings,
	policy: RoutePolicy,
	nonces: NonceCounter,
	cursor: Option<CursorStore>,
	writer: Arc<UtxoWriter>,
	status: Arc<RwLock<ChainStatus>>,
	task: Mutex<Option<RunningTask>>,
}

impl UtxoChain {
	pub fn new(
		id: ChainId,
		name: impl Into<String>,
		ledger: Arc<dyn LedgerInterface>,
		settings: PollerSettings,
		policy: RoutePolicy,
	) -> Result<Self, ChainError> {
		let name = name.into();
		if settings.addresses.is_empty() {
			return Err(ChainError::Configuration(
				"At least one watch address is required".into(),
			));
		}
		if settings.min_confirmations > settings.max_confirmations {
			return Err(ChainError::Configuration(format!(
				"min_confirmations ({}) exceeds max_confirmations ({})",
				settings.min_confirmations, settings.max_confirmations
			)));
		}
		if settings.retry_limit == 0 {
			return Err(ChainError::Configuration(
				"retry_limit must be at least 1".into(),
			));
		}
		policy
			.ensure_covers(id, &settings.addresses)
			.map_err(|e| configuration_error(&name, e))?;

		Ok(Self {
			status: Arc::new(RwLock::new(ChainStatus::new(id, name.clone()))),
			writer: Arc::new(UtxoWriter::new(id)),
			id,
			name,
			ledger,
			settings,
			policy,
			nonces: NonceCounter::default(),
			cursor: None,
			task: Mutex::new(None),
		})
	}

	/// Persists and restores the tracked set and nonce counter.
	pub fn with_cursor(mut self, cursor: CursorStore) -> Self {
		self.cursor = Some(cursor);
		self
	}

	async fn initial_tracker(&self) -> UtxoSetTracker {
		let Some(store) = &self.cursor else {
			return UtxoSetTracker::new();
		};

		match store.load().await {
			Ok(Some(cursor)) => {
				self.nonces.advance_to(cursor.next_nonce);
				tracing::info!(
					chain = %self.name,
					outputs = cursor.outputs.len(),
					next_nonce = cursor.next_nonce,
					"Restored cursor"
				);
				UtxoSetTracker::with_outputs(cursor.outputs)
			},
			Ok(None) => UtxoSetTracker::new(),
			Err(e) => {
				tracing::warn!(chain = %self.name, error = %e, "Failed to load cursor, starting fresh");
				UtxoSetTracker::new()
			},
		}
	}
}

#[async_trait]
impl ChainInterface for UtxoChain {
	fn id(&self) -> ChainId {
		self.id
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(UtxoChainSchema)
	}

	fn writer(&self) -> Arc<dyn WriterInterface> {
		self.writer.clone()
	}

	async fn start(
		&self,
		sink: Arc<dyn MessageSink>,
		failures: mpsc::UnboundedSender<ChainFailure>,
	) -> Result<(), ChainError> {
		let mut task = self.task.lock().await;
		if let Some(previous) = task.take() {
			if !previous.cancel.is_cancelled() && !previous.handle.is_finished() {
				*task = Some(previous);
				return Err(ChainError::AlreadyRunning);
			}
			// A stopped task may still be finishing its last fetch.
			if let Err(e) = previous.handle.await {
				tracing::warn!(chain = %self.name, error = %e, "Previous polling task did not exit cleanly");
			}
		}

		let tracker = self.initial_tracker().await;
		self.status.write().await.tracked_outputs = tracker.len();

		let cancel = CancellationToken::new();
		let translator = DepositTranslator::new(self.id, self.policy.clone(), self.nonces.clone());
		let mut poller = UtxoPoller::new(
			self.id,
			self.ledger.clone(),
			self.settings.clone(),
			tracker,
			translator,
			sink,
			cancel.clone(),
		)
		.with_status(self.status.clone());
		if let Some(store) = &self.cursor {
			poller = poller.with_cursor(store.clone());
		}

		let chain_id = self.id;
		let chain_name = self.name.clone();
		let status = self.status.clone();
		let span = tracing::info_span!("chain", name = %self.name, id = %self.id);
		let handle = tokio::spawn(
			async move {
				let (kind, error) = match AssertUnwindSafe(poller.run()).catch_unwind().await {
					Ok(Ok(())) => return,
					Ok(Err(e)) => (e.kind(), e.to_string()),
					Err(_) => {
						tracing::error!("Polling task panicked");
						status.write().await.state = PollerState::Failed;
						(FailureKind::Panicked, "polling task panicked".to_string())
					},
				};
				let _ = failures.send(ChainFailure {
					chain_id,
					chain_name,
					kind,
					error,
				});
			}
			.instrument(span),
		);

		tracing::info!(
			chain = %self.name,
			addresses = self.settings.addresses.len(),
			interval_ms = self.settings.interval.as_millis() as u64,
			"Started polling"
		);
		*task = Some(RunningTask { cancel, handle });
		Ok(())
	}

	async fn stop(&self) -> Result<(), ChainError> {
		if let Some(running) = self.task.lock().await.as_ref() {
			if !running.cancel.is_cancelled() {
				running.cancel.cancel();
				tracing::info!(chain = %self.name, "Stop requested");
			}
		}
		Ok(())
	}

	async fn latest_status(&self) -> ChainStatus {
		self.status.read().await.clone()
	}
}

/// Builds a UTXO adapter from configuration.
///
/// When a wallet is configured it is loaded (and unlocked if a passphrase is
/// given) before the adapter is returned, so this talks to the node.
pub fn create_chain(
	descriptor: &ChainDescriptor,
	config: &toml::Value,
	storage: Option<Arc<StorageService>>,
) -> Result<Box<dyn ChainInterface>, ChainError> {
	UtxoChainSchema
		.validate(config)
		.map_err(|e| ChainError::Configuration(format!("Chain '{}': {}", descriptor.name, e)))?;
	let options: UtxoOptions = config
		.clone()
		.try_into()
		.map_err(|e| ChainError::Configuration(format!("Chain '{}': {}", descriptor.name, e)))?;

	let mut by_address = HashMap::new();
	for entry in options.routes {
		let route = Route {
			destination: entry.chain_id,
			resource_id: entry.resource_id,
			recipient: entry.recipient,
		};
		if by_address.insert(entry.address.clone(), route).is_some() {
			return Err(ChainError::Configuration(format!(
				"Chain '{}': duplicate route for address {}",
				descriptor.name, entry.address
			)));
		}
	}
	let policy = RoutePolicy::new(options.destination, by_address)
		.map_err(|e| configuration_error(&descriptor.name, e))?;

	if options.wallet_passphrase.is_some() && options.wallet.is_none() {
		return Err(ChainError::Configuration(format!(
			"Chain '{}': wallet_passphrase requires wallet",
			descriptor.name
		)));
	}
	let cursor = match (options.persist_cursor, storage) {
		(false, _) => None,
		(true, Some(storage)) => Some(CursorStore::new(storage, descriptor.id)),
		(true, None) => {
			return Err(ChainError::Configuration(format!(
				"Chain '{}': persist_cursor requires a storage backend",
				descriptor.name
			)))
		},
	};

	let client = BitcoindClient::new(
		&descriptor.endpoint,
		options.wallet.as_deref(),
		options.rpc_user,
		options.rpc_password,
		Duration::from_secs(options.request_timeout_secs),
	)
	.map_err(|e| ChainError::Connection(e.to_string()))?;

	if let Some(wallet) = &options.wallet {
		let unlock_timeout = Duration::from_secs(options.unlock_timeout_secs);
		tokio::task::block_in_place(|| {
			tokio::runtime::Handle::current().block_on(client.prepare_wallet(
				wallet,
				options.wallet_passphrase.as_ref(),
				unlock_timeout,
			))
		})
		.map_err(|e| ChainError::Connection(format!("Chain '{}': {}", descriptor.name, e)))?;
	}

	let settings = PollerSettings {
		addresses: options.watch_addresses,
		min_confirmations: options.min_confirmations,
		max_confirmations: options.max_confirmations,
		interval: Duration::from_millis(options.polling_interval_ms),
		retry_interval: Duration::from_millis(options.retry_interval_ms),
		retry_limit: options.retry_limit,
	};

	let mut chain = UtxoChain::new(
		descriptor.id,
		descriptor.name.clone(),
		Arc::new(client),
		settings,
		policy,
	)?;
	if let Some(cursor) = cursor {
		chain = chain.with_cursor(cursor);
	}

	Ok(Box::new(chain))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "utxo";
	type Factory = crate::ChainFactory;

	fn factory() -> Self::Factory {
		create_chain
	}
}

impl crate::ChainRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ChainService;
	use cursor::Cursor;
	use ledger::{LedgerError, MockLedgerInterface};
	use relay_router::Router;
	use relay_storage::implementations::memory::MemoryStorage;
	use relay_types::{Nonce, OutputId, TransferMessage, UnspentOutput};
	use std::sync::Mutex as StdMutex;

	const RID: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

	/// Returns whatever snapshot is currently set.
	struct FixedLedger {
		snapshot: StdMutex<Vec<UnspentOutput>>,
	}

	#[async_trait]
	impl LedgerInterface for FixedLedger {
		async fn list_unspent(
			&self,
			_: u32,
			_: u32,
			_: &[String],
		) -> Result<Vec<UnspentOutput>, LedgerError> {
			Ok(self.snapshot.lock().unwrap().clone())
		}
	}

	#[derive(Default)]
	struct Inbox {
		received: StdMutex<Vec<TransferMessage>>,
	}

	#[async_trait]
	impl WriterInterface for Inbox {
		async fn resolve_message(
			&self,
			message: TransferMessage,
		) -> Result<(), relay_router::WriterError> {
			self.received.lock().unwrap().push(message);
			Ok(())
		}
	}

	fn utxo(txid: &str, amount: u64) -> UnspentOutput {
		UnspentOutput {
			id: OutputId::new(txid, 0),
			address: "addr1".to_string(),
			amount,
			confirmations: 1,
		}
	}

	fn settings() -> PollerSettings {
		PollerSettings {
			addresses: vec!["addr1".to_string()],
			min_confirmations: 1,
			max_confirmations: 9_999_999,
			interval: Duration::from_secs(1),
			retry_interval: Duration::from_secs(1),
			retry_limit: 3,
		}
	}

	fn policy() -> RoutePolicy {
		RoutePolicy::fixed(Route {
			destination: ChainId(2),
			resource_id: RID.parse().unwrap(),
			recipient: vec![0xaa],
		})
	}

	fn chain(ledger: Arc<dyn LedgerInterface>) -> UtxoChain {
		UtxoChain::new(ChainId(1), "btg", ledger, settings(), policy()).unwrap()
	}

	async fn router_with_inbox() -> (Arc<Router>, Arc<Inbox>) {
		let router = Arc::new(Router::new());
		let inbox = Arc::new(Inbox::default());
		router.listen(ChainId(2), inbox.clone()).await;
		(router, inbox)
	}

	fn nonces(inbox: &Inbox) -> Vec<u64> {
		inbox.received.lock().unwrap().iter().map(|m| m.nonce.0).collect()
	}

	#[tokio::test(start_paused = true)]
	async fn test_start_routes_deposits_and_stop() {
		let ledger = Arc::new(FixedLedger {
			snapshot: StdMutex::new(vec![utxo("aa", 5), utxo("bb", 6)]),
		});
		let chain = chain(ledger);
		let (router, inbox) = router_with_inbox().await;
		let (tx, _rx) = mpsc::unbounded_channel();

		chain.start(router, tx).await.unwrap();
		tokio::time::sleep(Duration::from_millis(10)).await;

		assert_eq!(nonces(&inbox), vec![1, 2]);
		let status = chain.latest_status().await;
		assert_eq!(status.state, PollerState::Polling);
		assert_eq!(status.tracked_outputs, 2);
		assert_eq!(status.last_nonce, Some(Nonce(2)));

		chain.stop().await.unwrap();
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(chain.latest_status().await.state, PollerState::Stopped);
	}

	#[tokio::test(start_paused = true)]
	async fn test_second_start_is_refused() {
		let chain = chain(Arc::new(FixedLedger {
			snapshot: StdMutex::new(vec![]),
		}));
		let (router, _inbox) = router_with_inbox().await;
		let (tx, _rx) = mpsc::unbounded_channel();

		chain.start(router.clone(), tx.clone()).await.unwrap();
		assert!(matches!(
			chain.start(router, tx).await,
			Err(ChainError::AlreadyRunning)
		));
		chain.stop().await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn test_restart_never_repeats_nonces() {
		let chain = chain(Arc::new(FixedLedger {
			snapshot: StdMutex::new(vec![utxo("aa", 5)]),
		}));
		let (router, inbox) = router_with_inbox().await;
		let (tx, _rx) = mpsc::unbounded_channel();

		chain.start(router.clone(), tx.clone()).await.unwrap();
		tokio::time::sleep(Duration::from_millis(10)).await;
		chain.stop().await.unwrap();

		// The tracked set starts empty again, so the same output is
		// reported once more, with a fresh nonce.
		chain.start(router, tx).await.unwrap();
		tokio::time::sleep(Duration::from_millis(10)).await;
		chain.stop().await.unwrap();

		assert_eq!(nonces(&inbox), vec![1, 2]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_exhausted_retries_reported_once() {
		let mut ledger = MockLedgerInterface::new();
		ledger
			.expect_list_unspent()
			.times(3)
			.returning(|_, _, _| Err(LedgerError::Transport("refused".into())));
		let chain = chain(Arc::new(ledger));
		let (router, _inbox) = router_with_inbox().await;
		let (tx, mut rx) = mpsc::unbounded_channel();

		chain.start(router, tx).await.unwrap();

		let failure = rx.recv().await.unwrap();
		assert_eq!(failure.chain_id, ChainId(1));
		assert_eq!(failure.chain_name, "btg");
		assert_eq!(failure.kind, FailureKind::RetriesExhausted { attempts: 3 });
		assert!(failure.error.contains("3 times"));
		assert_eq!(chain.latest_status().await.state, PollerState::Failed);

		// The task is gone; the sender it held is dropped with it.
		assert!(rx.recv().await.is_none());
	}

	/// Panics on the first fetch, serves an empty snapshot afterwards.
	struct PanicOnceLedger {
		panicked: std::sync::atomic::AtomicBool,
	}

	#[async_trait]
	impl LedgerInterface for PanicOnceLedger {
		async fn list_unspent(
			&self,
			_: u32,
			_: u32,
			_: &[String],
		) -> Result<Vec<UnspentOutput>, LedgerError> {
			if !self.panicked.swap(true, std::sync::atomic::Ordering::SeqCst) {
				panic!("node returned garbage");
			}
			Ok(vec![])
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_panicked_task_is_reported_and_restartable() {
		let chain = chain(Arc::new(PanicOnceLedger {
			panicked: std::sync::atomic::AtomicBool::new(false),
		}));
		let (router, _inbox) = router_with_inbox().await;
		let (tx, mut rx) = mpsc::unbounded_channel();

		chain.start(router.clone(), tx.clone()).await.unwrap();

		let failure = rx.recv().await.unwrap();
		assert_eq!(failure.kind, FailureKind::Panicked);
		assert_eq!(chain.latest_status().await.state, PollerState::Failed);
		tokio::time::sleep(Duration::from_millis(1)).await;

		chain.start(router, tx).await.unwrap();
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(chain.latest_status().await.state, PollerState::Polling);
		chain.stop().await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn test_cursor_restores_tracked_set_and_nonce() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let store = CursorStore::new(storage, ChainId(1));
		store
			.save(&Cursor {
				outputs: vec![utxo("aa", 5)],
				next_nonce: 7,
			})
			.await
			.unwrap();

		let chain = chain(Arc::new(FixedLedger {
			snapshot: StdMutex::new(vec![utxo("aa", 5), utxo("bb", 1)]),
		}))
		.with_cursor(store.clone());
		let (router, inbox) = router_with_inbox().await;
		let (tx, _rx) = mpsc::unbounded_channel();

		chain.start(router, tx).await.unwrap();
		tokio::time::sleep(Duration::from_millis(10)).await;
		chain.stop().await.unwrap();

		assert_eq!(nonces(&inbox), vec![7]);
		let saved = store.load().await.unwrap().unwrap();
		assert_eq!(saved.next_nonce, 8);
		assert_eq!(saved.outputs.len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_service_statuses_sorted() {
		let empty = || {
			Arc::new(FixedLedger {
				snapshot: StdMutex::new(vec![]),
			})
		};
		let mut other_settings = settings();
		other_settings.addresses = vec!["addr9".to_string()];
		let other = UtxoChain::new(ChainId(3), "other", empty(), other_settings, policy()).unwrap();
		let service = ChainService::new(vec![Arc::new(other), Arc::new(chain(empty()))]);

		let (router, _inbox) = router_with_inbox().await;
		let (tx, _rx) = mpsc::unbounded_channel();
		service.start_all(router, tx).await.unwrap();

		let ids: Vec<_> = service.statuses().await.iter().map(|s| s.chain_id).collect();
		assert_eq!(ids, vec![ChainId(1), ChainId(3)]);
		assert!(service.get(ChainId(3)).is_some());

		service.stop_all().await;
	}

	#[test]
	fn test_new_rejects_bad_settings() {
		let ledger = || -> Arc<dyn LedgerInterface> {
			Arc::new(FixedLedger {
				snapshot: StdMutex::new(vec![]),
			})
		};

		let mut inverted = settings();
		inverted.min_confirmations = 10;
		inverted.max_confirmations = 1;
		assert!(matches!(
			UtxoChain::new(ChainId(1), "btg", ledger(), inverted, policy()),
			Err(ChainError::Configuration(_))
		));

		// A route back to the source chain is refused.
		assert!(matches!(
			UtxoChain::new(ChainId(2), "btg", ledger(), settings(), policy()),
			Err(ChainError::Configuration(_))
		));
	}

	fn descriptor() -> ChainDescriptor {
		ChainDescriptor {
			id: ChainId(1),
			name: "btg".to_string(),
			endpoint: "http://127.0.0.1:8332".to_string(),
		}
	}

	fn opts(extra: &str) -> toml::Value {
		toml::from_str(&format!(
			r#"
rpc_user = "user"
rpc_password = "pass"
watch_addresses = ["addr1", "addr2"]
{}
"#,
			extra
		))
		.unwrap()
	}

	#[tokio::test]
	async fn test_factory_builds_with_lookup_routes() {
		let config = opts(&format!(
			r#"
polling_interval_ms = 500
[destination]
chain_id = 2
resource_id = "{rid}"
recipient = "0xaa"
[[routes]]
address = "addr2"
chain_id = 3
resource_id = "{rid}"
recipient = "0xbb"
"#,
			rid = RID
		));

		let chain = create_chain(&descriptor(), &config, None).unwrap();
		assert_eq!(chain.id(), ChainId(1));
		assert_eq!(chain.name(), "btg");
		assert!(chain.config_schema().validate(&config).is_ok());
	}

	#[tokio::test]
	async fn test_factory_rejects_unrouted_address() {
		let config = opts(&format!(
			r#"
[[routes]]
address = "addr1"
chain_id = 2
resource_id = "{}"
recipient = "0xaa"
"#,
			RID
		));
		let err = create_chain(&descriptor(), &config, None).err().unwrap();
		assert!(err.to_string().contains("addr2 has no route"));
	}

	#[tokio::test]
	async fn test_factory_rejects_empty_resource_id() {
		let config = opts(
			r#"
[destination]
chain_id = 2
resource_id = "0x0000000000000000000000000000000000000000000000000000000000000000"
recipient = "0xaa"
"#,
		);
		let err = create_chain(&descriptor(), &config, None).err().unwrap();
		assert!(matches!(err, ChainError::Configuration(_)));
	}

	#[tokio::test]
	async fn test_factory_requires_storage_for_cursor() {
		let config = opts(&format!(
			"persist_cursor = true\n[destination]\nchain_id = 2\nresource_id = \"{}\"\nrecipient = \"0xaa\"\n",
			RID
		));
		let err = create_chain(&descriptor(), &config, None).err().unwrap();
		assert!(err.to_string().contains("requires a storage backend"));
	}

	#[test]
	fn test_schema_errors() {
		assert!(UtxoChainSchema.validate(&opts("retry_limit = 0")).is_err());
		assert!(UtxoChainSchema
			.validate(&toml::from_str("rpc_user = \"u\"\nrpc_password = \"p\"\nwatch_addresses = []").unwrap())
			.is_err());
		assert!(UtxoChainSchema.validate(&opts("")).is_ok());
	}
}
