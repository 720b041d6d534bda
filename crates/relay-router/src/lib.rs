//! Message routing between chain adapters.
//!
//! Every adapter registers a writer for its own chain id with the [`Router`].
//! Source-side pollers hand finished transfer messages to the router through
//! the [`MessageSink`] trait, and the router forwards each message to the
//! writer registered for its destination chain.

use async_trait::async_trait;
use relay_types::{ChainId, TransferMessage};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by a destination-side writer.
#[derive(Debug, Error)]
pub enum WriterError {
	#[error("Message rejected: {0}")]
	Rejected(String),
	#[error("Writer unavailable: {0}")]
	Unavailable(String),
}

/// Errors raised while routing a message.
#[derive(Debug, Error)]
pub enum RouterError {
	#[error("No writer registered for chain {0}")]
	UnknownDestination(ChainId),
	#[error("Writer for chain {chain} failed: {source}")]
	Writer {
		chain: ChainId,
		#[source]
		source: WriterError,
	},
}

/// Destination side of an adapter.
///
/// Implementations must treat `(source, nonce)` as an idempotency key: a
/// message seen before is acknowledged again without a second effect.
#[async_trait]
pub trait WriterInterface: Send + Sync {
	async fn resolve_message(&self, message: TransferMessage) -> Result<(), WriterError>;
}

/// Anything that accepts outbound transfer messages.
#[async_trait]
pub trait MessageSink: Send + Sync {
	async fn send(&self, message: TransferMessage) -> Result<(), RouterError>;
}

/// Registry of writers keyed by chain id.
#[derive(Default)]
pub struct Router {
	writers: RwLock<HashMap<ChainId, Arc<dyn WriterInterface>>>,
}

impl Router {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `writer` as the destination for messages bound to `chain`.
	///
	/// A later registration for the same chain replaces the earlier one.
	pub async fn listen(&self, chain: ChainId, writer: Arc<dyn WriterInterface>) {
		if self.writers.write().await.insert(chain, writer).is_some() {
			tracing::warn!(chain = %chain, "Replaced existing writer");
		} else {
			tracing::debug!(chain = %chain, "Registered writer");
		}
	}

	/// Chain ids with a registered writer, in ascending order.
	pub async fn destinations(&self) -> Vec<ChainId> {
		let mut ids: Vec<_> = self.writers.read().await.keys().copied().collect();
		ids.sort();
		ids
	}
}

#[async_trait]
impl MessageSink for Router {
	async fn send(&self, message: TransferMessage) -> Result<(), RouterError> {
		let destination = message.destination;
		// Release the lock before awaiting the writer.
		let writer = self
			.writers
			.read()
			.await
			.get(&destination)
			.cloned()
			.ok_or(RouterError::UnknownDestination(destination))?;

		tracing::debug!(
			source = %message.source,
			destination = %destination,
			nonce = %message.nonce,
			"Routing message"
		);

		writer
			.resolve_message(message)
			.await
			.map_err(|source| RouterError::Writer {
				chain: destination,
				source,
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relay_types::{Nonce, ResourceId};
	use std::sync::Mutex;

	#[derive(Default)]
	struct RecordingWriter {
		received: Mutex<Vec<TransferMessage>>,
		fail: bool,
	}

	#[async_trait]
	impl WriterInterface for RecordingWriter {
		async fn resolve_message(&self, message: TransferMessage) -> Result<(), WriterError> {
			if self.fail {
				return Err(WriterError::Unavailable("down".into()));
			}
			self.received.lock().unwrap().push(message);
			Ok(())
		}
	}

	fn message(destination: u8, nonce: u64) -> TransferMessage {
		TransferMessage::fungible(
			ChainId(1),
			ChainId(destination),
			Nonce(nonce),
			100,
			ResourceId([1; 32]),
			vec![0xaa],
		)
	}

	#[tokio::test]
	async fn test_routes_to_registered_writer() {
		let router = Router::new();
		let writer = Arc::new(RecordingWriter::default());
		router.listen(ChainId(2), writer.clone()).await;

		router.send(message(2, 1)).await.unwrap();
		router.send(message(2, 2)).await.unwrap();

		let received = writer.received.lock().unwrap();
		assert_eq!(received.len(), 2);
		assert_eq!(received[1].nonce, Nonce(2));
	}

	#[tokio::test]
	async fn test_unknown_destination() {
		let router = Router::new();
		let err = router.send(message(9, 1)).await.unwrap_err();
		assert!(matches!(err, RouterError::UnknownDestination(ChainId(9))));
	}

	#[tokio::test]
	async fn test_writer_failure_is_wrapped() {
		let router = Router::new();
		router
			.listen(
				ChainId(2),
				Arc::new(RecordingWriter {
					fail: true,
					..Default::default()
				}),
			)
			.await;

		let err = router.send(message(2, 1)).await.unwrap_err();
		assert!(matches!(err, RouterError::Writer { chain: ChainId(2), .. }));
	}

	#[tokio::test]
	async fn test_destinations_sorted() {
		let router = Router::new();
		router.listen(ChainId(3), Arc::new(RecordingWriter::default())).await;
		router.listen(ChainId(1), Arc::new(RecordingWriter::default())).await;
		router.listen(ChainId(3), Arc::new(RecordingWriter::default())).await;
		assert_eq!(router.destinations().await, vec![ChainId(1), ChainId(3)]);
	}
}
