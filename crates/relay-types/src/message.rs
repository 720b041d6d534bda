//! Cross-chain transfer messages exchanged through the router.

use crate::{ChainId, Nonce, ResourceId};
use serde::{Deserialize, Serialize};

/// A fungible transfer from a source chain toward a destination chain.
///
/// Messages are handed to the router by value and never mutated afterwards.
/// Writers use `(source, nonce)` as the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMessage {
	pub source: ChainId,
	pub destination: ChainId,
	pub nonce: Nonce,
	pub resource_id: ResourceId,
	/// Amount in the source ledger's smallest denomination.
	pub amount: u64,
	/// Recipient address on the destination chain.
	#[serde(with = "hex_bytes")]
	pub recipient: Vec<u8>,
}

impl TransferMessage {
	pub fn fungible(
		source: ChainId,
		destination: ChainId,
		nonce: Nonce,
		amount: u64,
		resource_id: ResourceId,
		recipient: Vec<u8>,
	) -> Self {
		Self {
			source,
			destination,
			nonce,
			resource_id,
			amount,
			recipient,
		}
	}
}

/// Where deposits to a watched address are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
	#[serde(rename = "chain_id")]
	pub destination: ChainId,
	pub resource_id: ResourceId,
	#[serde(with = "hex_bytes")]
	pub recipient: Vec<u8>,
}

/// Serde adapter rendering byte vectors as `0x`-prefixed hex strings.
pub mod hex_bytes {
	use crate::utils::{with_0x_prefix, without_0x_prefix};
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&with_0x_prefix(&hex::encode(bytes)))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
		let s = String::deserialize(deserializer)?;
		hex::decode(without_0x_prefix(&s)).map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_route_from_toml() {
		let route: Route = toml::from_str(
			r#"
chain_id = 2
resource_id = "0x0000000000000000000000000000000000000000000000000000000000000001"
recipient = "0xdeadbeef"
"#,
		)
		.unwrap();

		assert_eq!(route.destination, ChainId(2));
		assert_eq!(route.recipient, vec![0xde, 0xad, 0xbe, 0xef]);
		assert_eq!(route.resource_id.0[31], 1);
	}

	#[test]
	fn test_message_json_shape() {
		let msg = TransferMessage::fungible(
			ChainId(1),
			ChainId(2),
			Nonce(7),
			5,
			ResourceId([1u8; 32]),
			vec![0xab],
		);
		let json = serde_json::to_value(&msg).unwrap();
		assert_eq!(json["nonce"], 7);
		assert_eq!(json["recipient"], "0xab");
		assert_eq!(json["destination"], 2);
	}
}
