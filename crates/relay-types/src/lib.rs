//! Common types for the UTXO relay.
//!
//! Data types shared by every relay crate: chain identifiers, observed
//! outputs, cross-chain transfer messages and adapter status snapshots, plus
//! the configuration validation helpers used by pluggable implementations.

/// Chain identifiers, nonces and resource identifiers.
pub mod chain;
/// Cross-chain transfer messages and routing targets.
pub mod message;
/// Self-registration trait for pluggable implementations.
pub mod registry;
/// Redacting wrapper for credentials.
pub mod secret_string;
/// Adapter health snapshots.
pub mod status;
/// Storage namespaces.
pub mod storage;
/// Helpers for ids and timestamps.
pub mod utils;
/// Unspent outputs and deposit events.
pub mod utxo;
/// TOML schema validation for implementation configs.
pub mod validation;

pub use chain::{ChainId, Nonce, ResourceId, ResourceIdError};
pub use message::{Route, TransferMessage};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use status::{ChainStatus, PollerState};
pub use storage::StorageKey;
pub use utils::{current_timestamp, truncate_id, with_0x_prefix, without_0x_prefix};
pub use utxo::{DepositEvent, OutputId, UnspentOutput};
pub use validation::*;
