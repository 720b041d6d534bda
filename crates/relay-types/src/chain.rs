//! Chain-level identifiers shared by every adapter.

use crate::utils::{with_0x_prefix, without_0x_prefix};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a chain registered with the relay.
///
/// Chain ids are small integers assigned by the relay deployment, not the
/// ledger's own network magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u8);

impl fmt::Display for ChainId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u8> for ChainId {
	fn from(id: u8) -> Self {
		Self(id)
	}
}

/// Per-adapter sequence number attached to every transfer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(pub u64);

impl fmt::Display for Nonce {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Errors produced when parsing a resource identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceIdError {
	#[error("Invalid hex: {0}")]
	InvalidHex(String),
	#[error("Resource id must be 32 bytes, got {0}")]
	InvalidLength(usize),
}

/// Opaque 32-byte token naming the asset a transfer represents.
///
/// Rendered as `0x`-prefixed hex. The all-zero value is treated as "unset".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceId(pub [u8; 32]);

impl ResourceId {
	pub const LEN: usize = 32;

	/// Builds a resource id from a slice that must be exactly 32 bytes.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, ResourceIdError> {
		let array: [u8; 32] = bytes
			.try_into()
			.map_err(|_| ResourceIdError::InvalidLength(bytes.len()))?;
		Ok(Self(array))
	}

	/// Returns true for the all-zero id.
	pub fn is_empty(&self) -> bool {
		self.0.iter().all(|b| *b == 0)
	}

	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}
}

impl fmt::Display for ResourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", with_0x_prefix(&hex::encode(self.0)))
	}
}

impl fmt::Debug for ResourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ResourceId({})", self)
	}
}

impl FromStr for ResourceId {
	type Err = ResourceIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes = hex::decode(without_0x_prefix(s.trim()))
			.map_err(|e| ResourceIdError::InvalidHex(e.to_string()))?;
		Self::from_slice(&bytes)
	}
}

impl Serialize for ResourceId {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

impl<'de> Deserialize<'de> for ResourceId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const RID: &str = "0x000000000000000000000000000000c76ebe4a02bbc34786d860b355f5a5ce00";

	#[test]
	fn test_resource_id_parse_and_display() {
		let rid: ResourceId = RID.parse().unwrap();
		assert_eq!(rid.to_string(), RID);
		assert!(!rid.is_empty());

		let unprefixed: ResourceId = RID.trim_start_matches("0x").parse().unwrap();
		assert_eq!(rid, unprefixed);
	}

	#[test]
	fn test_resource_id_rejects_bad_input() {
		assert_eq!(
			"0x1234".parse::<ResourceId>(),
			Err(ResourceIdError::InvalidLength(2))
		);
		assert!(matches!(
			"0xzz".parse::<ResourceId>(),
			Err(ResourceIdError::InvalidHex(_))
		));
	}

	#[test]
	fn test_zero_resource_id_is_empty() {
		assert!(ResourceId::default().is_empty());
	}

	#[test]
	fn test_resource_id_serde_uses_hex() {
		let rid: ResourceId = RID.parse().unwrap();
		let json = serde_json::to_string(&rid).unwrap();
		assert_eq!(json, format!("\"{}\"", RID));
		let back: ResourceId = serde_json::from_str(&json).unwrap();
		assert_eq!(back, rid);
	}
}
