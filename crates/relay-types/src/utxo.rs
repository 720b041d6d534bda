//! Unspent outputs as reported by a UTXO ledger, and the deposit events
//! derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outpoint identifying a single transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputId {
	/// Transaction id, hex encoded as the node reports it.
	pub txid: String,
	/// Index of the output within the transaction.
	pub vout: u32,
}

impl OutputId {
	pub fn new(txid: impl Into<String>, vout: u32) -> Self {
		Self {
			txid: txid.into(),
			vout,
		}
	}
}

impl fmt::Display for OutputId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.txid, self.vout)
	}
}

/// A single unspent output paid to a watched address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
	pub id: OutputId,
	/// Owning address.
	pub address: String,
	/// Value in the smallest denomination.
	pub amount: u64,
	/// Confirmations at the time of the snapshot.
	pub confirmations: u32,
}

/// A previously unseen output that appeared at a watched address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
	pub output_id: OutputId,
	pub address: String,
	pub amount: u64,
}

impl From<&UnspentOutput> for DepositEvent {
	fn from(output: &UnspentOutput) -> Self {
		Self {
			output_id: output.id.clone(),
			address: output.address.clone(),
			amount: output.amount,
		}
	}
}
