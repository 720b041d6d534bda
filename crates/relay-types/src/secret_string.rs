//! Redacting string wrapper for RPC credentials and wallet passphrases.
//!
//! Credentials reach the relay through configuration (usually `${ENV}`
//! placeholders) and must never show up in logs, debug output or API
//! responses. `SecretString` zeroes its buffer on drop and prints as
//! `***REDACTED***`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Returns the plaintext. Callers must not log or persist it.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString({})", REDACTED)
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

impl Serialize for SecretString {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(SecretString::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_secret_is_redacted() {
		let secret = SecretString::from("rpc-password");
		assert_eq!(format!("{:?}", secret), "SecretString(***REDACTED***)");
		assert_eq!(secret.to_string(), "***REDACTED***");
		assert_eq!(
			serde_json::to_string(&secret).unwrap(),
			"\"***REDACTED***\""
		);
		assert_eq!(secret.expose_secret(), "rpc-password");
	}

	#[test]
	fn test_secret_deserializes_plaintext() {
		#[derive(Deserialize)]
		struct Creds {
			password: SecretString,
		}

		let creds: Creds = toml::from_str("password = \"hunter2\"").unwrap();
		assert_eq!(creds.password.expose_secret(), "hunter2");
	}
}
