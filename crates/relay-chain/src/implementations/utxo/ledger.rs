//! Connection to a UTXO ledger node.
//!
//! [`LedgerInterface`] is the only thing the polling loop needs from the
//! node. [`BitcoindClient`] implements it against the bitcoind-compatible
//! JSON-RPC API (Bitcoin Core and its forks such as Bitcoin Gold).

use async_trait::async_trait;
use relay_types::{OutputId, SecretString, UnspentOutput};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Satoshis (or the fork's equivalent) per coin.
const UNITS_PER_COIN: f64 = 100_000_000.0;

/// Errors from a ledger fetch. All of them are treated as transient by the
/// polling loop.
#[derive(Debug, Error)]
pub enum LedgerError {
	#[error("Transport error: {0}")]
	Transport(String),
	#[error("RPC error {code}: {message}")]
	Rpc { code: i64, message: String },
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerInterface: Send + Sync {
	/// Lists outputs paid to `addresses` with a confirmation count in
	/// `[min_confirmations, max_confirmations]`.
	async fn list_unspent(
		&self,
		min_confirmations: u32,
		max_confirmations: u32,
		addresses: &[String],
	) -> Result<Vec<UnspentOutput>, LedgerError>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
	jsonrpc: &'static str,
	id: u64,
	method: &'a str,
	params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
	result: Option<Value>,
	error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
	code: i64,
	message: String,
}

/// One entry of a `listunspent` reply.
#[derive(Debug, Deserialize)]
struct ListUnspentEntry {
	txid: String,
	vout: u32,
	address: Option<String>,
	amount: f64,
	confirmations: u32,
}

impl TryFrom<ListUnspentEntry> for UnspentOutput {
	type Error = LedgerError;

	fn try_from(entry: ListUnspentEntry) -> Result<Self, Self::Error> {
		let address = entry.address.ok_or_else(|| {
			LedgerError::InvalidResponse(format!("Output {}:{} has no address", entry.txid, entry.vout))
		})?;
		let amount = coins_to_units(entry.amount).ok_or_else(|| {
			LedgerError::InvalidResponse(format!(
				"Output {}:{} has invalid amount {}",
				entry.txid, entry.vout, entry.amount
			))
		})?;

		Ok(UnspentOutput {
			id: OutputId::new(entry.txid, entry.vout),
			address,
			amount,
			confirmations: entry.confirmations,
		})
	}
}

/// Converts a coin amount as reported by the node into the smallest unit.
pub fn coins_to_units(coins: f64) -> Option<u64> {
	let units = (coins * UNITS_PER_COIN).round();
	if !units.is_finite() || units < 0.0 || units > u64::MAX as f64 {
		return None;
	}
	Some(units as u64)
}

/// JSON-RPC client for a bitcoind-compatible node.
pub struct BitcoindClient {
	http: reqwest::Client,
	node_url: String,
	wallet_url: String,
	user: String,
	password: SecretString,
	request_id: AtomicU64,
}

impl BitcoindClient {
	/// Creates a client. Wallet-scoped calls go to `<endpoint>/wallet/<wallet>`
	/// when a wallet name is given.
	pub fn new(
		endpoint: &str,
		wallet: Option<&str>,
		user: impl Into<String>,
		password: SecretString,
		request_timeout: Duration,
	) -> Result<Self, LedgerError> {
		let http = reqwest::Client::builder()
			.timeout(request_timeout)
			.build()
			.map_err(|e| LedgerError::Transport(e.to_string()))?;

		let node_url = endpoint.trim_end_matches('/').to_string();
		let wallet_url = match wallet {
			Some(name) => format!("{}/wallet/{}", node_url, name),
			None => node_url.clone(),
		};

		Ok(Self {
			http,
			node_url,
			wallet_url,
			user: user.into(),
			password,
			request_id: AtomicU64::new(1),
		})
	}

	async fn call<T: DeserializeOwned>(
		&self,
		url: &str,
		method: &str,
		params: Vec<Value>,
	) -> Result<T, LedgerError> {
		let request = RpcRequest {
			jsonrpc: "1.0",
			id: self.request_id.fetch_add(1, Ordering::Relaxed),
			method,
			params,
		};

		let response = self
			.http
			.post(url)
			.basic_auth(&self.user, Some(self.password.expose_secret()))
			.json(&request)
			.send()
			.await
			.map_err(|e| LedgerError::Transport(format!("{} failed: {}", method, e)))?;

		// bitcoind reports RPC errors with a non-2xx status and a JSON body,
		// so only fall back to the status when the body is not JSON-RPC.
		let status = response.status();
		let body = response
			.bytes()
			.await
			.map_err(|e| LedgerError::Transport(e.to_string()))?;
		let reply: RpcResponse = serde_json::from_slice(&body).map_err(|_| {
			LedgerError::Transport(format!("{} returned HTTP {}", method, status))
		})?;

		if let Some(error) = reply.error {
			return Err(LedgerError::Rpc {
				code: error.code,
				message: error.message,
			});
		}

		serde_json::from_value(reply.result.unwrap_or(Value::Null))
			.map_err(|e| LedgerError::InvalidResponse(format!("{}: {}", method, e)))
	}

	/// Makes sure `wallet` is loaded and, if a passphrase is given, unlocked
	/// for `unlock_timeout`.
	pub async fn prepare_wallet(
		&self,
		wallet: &str,
		passphrase: Option<&SecretString>,
		unlock_timeout: Duration,
	) -> Result<(), LedgerError> {
		let loaded: Vec<String> = self.call(&self.node_url, "listwallets", vec![]).await?;
		if loaded.iter().any(|w| w == wallet) {
			tracing::debug!(wallet, "Wallet already loaded");
		} else {
			tracing::info!(wallet, "Loading wallet");
			let _: Value = self
				.call(&self.node_url, "loadwallet", vec![json!(wallet)])
				.await?;
		}

		if let Some(passphrase) = passphrase {
			let _: Value = self
				.call(
					&self.wallet_url,
					"walletpassphrase",
					vec![
						json!(passphrase.expose_secret()),
						json!(unlock_timeout.as_secs()),
					],
				)
				.await?;
			tracing::info!(wallet, timeout_secs = unlock_timeout.as_secs(), "Wallet unlocked");
		}

		Ok(())
	}
}

#[async_trait]
impl LedgerInterface for BitcoindClient {
	async fn list_unspent(
		&self,
		min_confirmations: u32,
		max_confirmations: u32,
		addresses: &[String],
	) -> Result<Vec<UnspentOutput>, LedgerError> {
		let entries: Vec<ListUnspentEntry> = self
			.call(
				&self.wallet_url,
				"listunspent",
				vec![
					json!(min_confirmations),
					json!(max_confirmations),
					json!(addresses),
				],
			)
			.await?;

		entries.into_iter().map(UnspentOutput::try_from).collect()
	}
}
