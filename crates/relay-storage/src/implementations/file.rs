//! File-based storage backend.
//!
//! Each key is one JSON file under `storage_path`. Writes go to a temporary
//! file first and are renamed into place, so a crash mid-write leaves the
//! previous value intact.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use relay_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::path::PathBuf;
use tokio::fs;

const DEFAULT_STORAGE_PATH: &str = "./data/storage";

pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	fn file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', '\\', ':', '.'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match fs::read(self.file_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.file_path(key);
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		tracing::trace!(key, path = %path.display(), "Stored value");
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.file_path(key)).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(s) if !s.trim().is_empty() => Ok(()),
						_ => Err("storage_path cannot be empty".to_string()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_file_operations() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().join("nested"));

		assert!(matches!(
			storage.get_bytes("cursors:1").await,
			Err(StorageError::NotFound)
		));

		storage
			.set_bytes("cursors:1", b"{\"a\":1}".to_vec())
			.await
			.unwrap();
		assert!(storage.exists("cursors:1").await.unwrap());
		assert_eq!(storage.get_bytes("cursors:1").await.unwrap(), b"{\"a\":1}");
		assert!(dir.path().join("nested/cursors_1.json").exists());
		assert!(!dir.path().join("nested/cursors_1.tmp").exists());

		storage.delete("cursors:1").await.unwrap();
		assert!(!storage.exists("cursors:1").await.unwrap());
		storage.delete("cursors:1").await.unwrap();
	}

	#[tokio::test]
	async fn test_survives_new_instance() {
		let dir = TempDir::new().unwrap();
		FileStorage::new(dir.path().to_path_buf())
			.set_bytes("cursors:7", b"42".to_vec())
			.await
			.unwrap();

		let reopened = FileStorage::new(dir.path().to_path_buf());
		assert_eq!(reopened.get_bytes("cursors:7").await.unwrap(), b"42");
	}

	#[test]
	fn test_schema_rejects_empty_path() {
		let config: toml::Value = toml::from_str("storage_path = \"  \"").unwrap();
		assert!(FileStorageSchema.validate(&config).is_err());

		let config: toml::Value = toml::from_str("storage_path = \"/tmp/relay\"").unwrap();
		assert!(FileStorageSchema.validate(&config).is_ok());
	}
}
