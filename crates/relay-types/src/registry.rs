//! Self-registration for pluggable implementations.

/// Declares the configuration name and factory of an implementation.
///
/// Every storage backend and chain type exposes a `Registry` struct
/// implementing this trait, so the service can register them all without
/// naming each one, e.g. `memory` for `[storage.implementations.memory]` or
/// `utxo` for a chain with `type = "utxo"`.
pub trait ImplementationRegistry {
	/// Name used in configuration files.
	const NAME: &'static str;

	/// Factory signature, defined by the crate that owns the interface.
	type Factory;

	fn factory() -> Self::Factory;
}
