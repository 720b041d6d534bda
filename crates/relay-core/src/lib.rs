//! Core of the relay: the engine that supervises chain adapters and the
//! builder that assembles it from configuration.

pub mod builder;
pub mod engine;

pub use builder::{BuilderError, RelayBuilder, RelayFactories};
pub use engine::{EngineError, RelayEngine};
