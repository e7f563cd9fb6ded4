use std::collections::hash_map::Entry;

use fxhash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::NodeId;

/// Reverse dependency relation: for every dependee, the nodes that read
/// it, each tagged with the round of the depender that recorded the
/// edge.
#[derive(Default, Debug)]
pub(crate) struct Dependents {
	edges: FxHashMap<NodeId, FxHashMap<NodeId, u64>>,
}

impl Dependents {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `true` when the edge did not exist before. Recording an
	/// existing edge again only refreshes its round.
	pub fn record(&mut self, dependee: NodeId, depender: NodeId, round: u64) -> bool {
		match self.edges.entry(dependee).or_default().entry(depender) {
			Entry::Occupied(mut entry) => {
				if *entry.get() < round {
					entry.insert(round);
				}
				false
			}
			Entry::Vacant(entry) => {
				entry.insert(round);
				true
			}
		}
	}

	/// Dependers of `node`, in creation order.
	pub fn dependents_of(&self, node: NodeId) -> SmallVec<[NodeId; 4]> {
		let mut dependents: SmallVec<[NodeId; 4]> = self
			.edges
			.get(&node)
			.map(|set| set.keys().copied().collect())
			.unwrap_or_default();
		dependents.sort_unstable();
		dependents
	}

	#[cfg(test)]
	pub fn contains(&self, dependee: NodeId, depender: NodeId) -> bool {
		self.edges
			.get(&dependee)
			.map_or(false, |set| set.contains_key(&depender))
	}

	/// Removes the edge if it was recorded by a round older than `round`.
	pub fn prune(&mut self, dependee: NodeId, depender: NodeId, round: u64) -> bool {
		let Some(set) = self.edges.get_mut(&dependee) else {
			return false;
		};

		let stale = set.get(&depender).map_or(false, |tag| *tag < round);
		if stale {
			set.remove(&depender);
			if set.is_empty() {
				self.edges.remove(&dependee);
			}
		}

		stale
	}

	/// Number of recorded edges.
	pub fn len(&self) -> usize {
		self.edges.values().map(|set| set.len()).sum()
	}

}

/// Dependees a node read during its last settled evaluation.
#[derive(Default, Debug)]
pub(crate) struct Dependencies {
	based_on: FxHashSet<NodeId>,
}

impl Dependencies {
	/// Replaces the set and returns the dependees that are no longer read.
	pub fn swap(&mut self, next: FxHashSet<NodeId>) -> Vec<NodeId> {
		let prev = std::mem::replace(&mut self.based_on, next);

		// Diff the keys
		prev.into_iter()
			.filter(|k| !self.based_on.contains(k))
			.collect()
	}
}
