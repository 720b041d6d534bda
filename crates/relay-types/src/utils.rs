//! Small helpers for ids and timestamps.

/// Shortens long ids for log output: first 8 characters followed by "..".
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}

/// Adds a "0x" prefix if missing.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Strips a "0x" or "0X" prefix if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Current UNIX time in seconds, 0 if the clock is before the epoch.
pub fn current_timestamp() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}
