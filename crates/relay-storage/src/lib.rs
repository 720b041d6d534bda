//! Storage for relay state.
//!
//! Backends implement [`StorageInterface`] over raw bytes. [`StorageService`]
//! adds JSON (de)serialization and namespacing on top, so adapters work with
//! typed values keyed by a [`StorageKey`] namespace and an id.

use async_trait::async_trait;
use relay_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A key/value byte store.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores `value`, replacing any previous value atomically.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes `key`. Deleting a missing key is not an error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Builds a backend from its `[storage.implementations.<name>]` table.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Returns every storage backend this crate provides.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Typed access to a storage backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: StorageKey, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	pub async fn store<T: Serialize>(
		&self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(namespace, id), bytes).await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve), but maps a missing key to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn remove(&self, namespace: StorageKey, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	pub async fn exists(&self, namespace: StorageKey, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}
}
