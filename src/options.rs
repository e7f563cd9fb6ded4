/// What happens to a dependency edge once the depender stops reading
/// the dependee.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum EdgePolicy {
	/// Edges not refreshed by the depender's latest evaluation are
	/// removed when that evaluation settles.
	#[default]
	Prune,
	/// Edges are never removed.
	Additive,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Options {
	pub edges: EdgePolicy,
}

impl Options {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn edges(mut self, edges: EdgePolicy) -> Self {
		self.edges = edges;
		self
	}
}
