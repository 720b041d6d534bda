//! Storage namespaces used by the relay.

use std::fmt;

/// Namespaces for data persisted through the storage service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Adapter cursors (tracked outputs and next nonce), keyed by chain id.
	Cursors,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Cursors => "cursors",
		}
	}
}

impl fmt::Display for StorageKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
