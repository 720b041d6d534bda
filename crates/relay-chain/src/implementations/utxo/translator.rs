//! Turns deposit events into transfer messages.

use relay_types::{ChainId, DepositEvent, Nonce, Route, TransferMessage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("No route for address {0}")]
	NoRoute(String),
	#[error("Nonce space exhausted")]
	NonceExhausted,
}

/// Source of per-adapter nonces.
///
/// Clones share the same counter. The adapter keeps one for its whole
/// lifetime so restarting the polling task never reuses a nonce.
#[derive(Debug, Clone)]
pub struct NonceCounter {
	next: Arc<AtomicU64>,
}

impl Default for NonceCounter {
	fn default() -> Self {
		Self::starting_at(1)
	}
}

impl NonceCounter {
	pub fn starting_at(first: u64) -> Self {
		Self {
			next: Arc::new(AtomicU64::new(first)),
		}
	}

	/// The nonce the next message will carry.
	pub fn peek(&self) -> u64 {
		self.next.load(Ordering::SeqCst)
	}

	/// Moves the counter forward to `next` if it is behind. Never moves it
	/// backwards.
	pub fn advance_to(&self, next: u64) {
		self.next.fetch_max(next, Ordering::SeqCst);
	}

	fn issue(&self) -> Result<Nonce, TranslateError> {
		self.next
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
			.map(Nonce)
			.map_err(|_| TranslateError::NonceExhausted)
	}
}

/// Decides where deposits to each watched address go.
///
/// Either every address shares one fixed route, or addresses are looked up
/// in a table with the fixed route as fallback. The policy is fixed when the
/// adapter is built.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
	fallback: Option<Route>,
	by_address: HashMap<String, Route>,
}

impl RoutePolicy {
	/// Every deposit goes to `route`.
	pub fn fixed(route: Route) -> Self {
		Self {
			fallback: Some(route),
			by_address: HashMap::new(),
		}
	}

	/// Per-address routes with an optional fallback.
	pub fn new(
		fallback: Option<Route>,
		by_address: HashMap<String, Route>,
	) -> Result<Self, TranslateError> {
		if fallback.is_none() && by_address.is_empty() {
			return Err(TranslateError::Configuration(
				"At least one route is required".into(),
			));
		}
		for route in fallback.iter().chain(by_address.values()) {
			validate_route(route)?;
		}
		Ok(Self {
			fallback,
			by_address,
		})
	}

	/// Checks that every address resolves and that no route points back at
	/// `source`.
	pub fn ensure_covers(&self, source: ChainId, addresses: &[String]) -> Result<(), TranslateError> {
		for address in addresses {
			let route = self.resolve(address).map_err(|_| {
				TranslateError::Configuration(format!(
					"Watched address {} has no route",
					address
				))
			})?;
			if route.destination == source {
				return Err(TranslateError::Configuration(format!(
					"Route for {} points back at source chain {}",
					address, source
				)));
			}
		}
		Ok(())
	}

	pub fn resolve(&self, address: &str) -> Result<&Route, TranslateError> {
		self.by_address
			.get(address)
			.or(self.fallback.as_ref())
			.ok_or_else(|| TranslateError::NoRoute(address.to_string()))
	}
}

fn validate_route(route: &Route) -> Result<(), TranslateError> {
	if route.resource_id.is_empty() {
		return Err(TranslateError::Configuration(format!(
			"Route to chain {} has an empty resource id",
			route.destination
		)));
	}
	if route.recipient.is_empty() {
		return Err(TranslateError::Configuration(format!(
			"Route to chain {} has an empty recipient",
			route.destination
		)));
	}
	Ok(())
}

/// Builds the message for `event` along `route`.
pub fn build_message(
	source: ChainId,
	event: &DepositEvent,
	route: &Route,
	nonce: Nonce,
) -> TransferMessage {
	TransferMessage::fungible(
		source,
		route.destination,
		nonce,
		event.amount,
		route.resource_id,
		route.recipient.clone(),
	)
}

/// Maps deposits on one source chain to transfer messages.
pub struct DepositTranslator {
	source: ChainId,
	policy: RoutePolicy,
	nonces: NonceCounter,
}

impl DepositTranslator {
	pub fn new(source: ChainId, policy: RoutePolicy, nonces: NonceCounter) -> Self {
		Self {
			source,
			policy,
			nonces,
		}
	}

	/// Translates one deposit, consuming a nonce only when a route exists.
	pub fn translate(&self, event: &DepositEvent) -> Result<TransferMessage, TranslateError> {
		let route = self.policy.resolve(&event.address)?;
		let nonce = self.nonces.issue()?;
		Ok(build_message(self.source, event, route, nonce))
	}

	pub fn next_nonce(&self) -> u64 {
		self.nonces.peek()
	}
}
