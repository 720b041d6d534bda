//! Set difference over successive unspent-output snapshots.

use relay_types::{OutputId, UnspentOutput};
use std::collections::HashMap;

#[derive(Clone)]
struct Tracked {
	output: UnspentOutput,
	seen: bool,
}

/// Remembers the outputs of the last successful snapshot.
///
/// After every [`diff`](Self::diff) the tracked set equals the snapshot that
/// was passed in, keyed by outpoint. Nothing else mutates it.
#[derive(Default, Clone)]
pub struct UtxoSetTracker {
	tracked: HashMap<OutputId, Tracked>,
}

impl UtxoSetTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seeds the tracker with outputs already known, e.g. from a cursor.
	pub fn with_outputs(outputs: impl IntoIterator<Item = UnspentOutput>) -> Self {
		let tracked = outputs
			.into_iter()
			.map(|output| {
				(
					output.id.clone(),
					Tracked {
						output,
						seen: false,
					},
				)
			})
			.collect();
		Self { tracked }
	}

	/// Applies `snapshot` and returns the outputs that were not tracked
	/// before, in snapshot order.
	///
	/// Outputs missing from `snapshot` are dropped from the tracked set. An
	/// identifier repeated within one snapshot counts once; its last
	/// occurrence wins.
	pub fn diff(&mut self, snapshot: Vec<UnspentOutput>) -> Vec<UnspentOutput> {
		let mut added = Vec::new();
		let mut added_index: HashMap<OutputId, usize> = HashMap::new();

		for output in snapshot {
			if let Some(&i) = added_index.get(&output.id) {
				added[i] = output.clone();
			}
			match self.tracked.get_mut(&output.id) {
				Some(entry) => {
					entry.seen = true;
					entry.output = output;
				},
				None => {
					added_index.insert(output.id.clone(), added.len());
					added.push(output.clone());
					self.tracked.insert(
						output.id.clone(),
						Tracked { output, seen: true },
					);
				},
			}
		}

		// Sweep what the snapshot no longer contains, then clear the marks.
		self.tracked.retain(|_, entry| entry.seen);
		for entry in self.tracked.values_mut() {
			entry.seen = false;
		}

		added
	}

	pub fn len(&self) -> usize {
		self.tracked.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tracked.is_empty()
	}

	pub fn contains(&self, id: &OutputId) -> bool {
		self.tracked.contains_key(id)
	}

	/// Tracked outputs ordered by outpoint.
	pub fn outputs(&self) -> Vec<UnspentOutput> {
		let mut outputs: Vec<_> = self.tracked.values().map(|t| t.output.clone()).collect();
		outputs.sort_by(|a, b| a.id.cmp(&b.id));
		outputs
	}
}
