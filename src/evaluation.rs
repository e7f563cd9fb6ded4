use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fxhash::FxHashMap;

use crate::{NodeId, ResolverFailure};

/// What a read observed of its target.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub(crate) enum Observed {
	Fallback,
	Revision(u64),
}

/// One in-flight run of a resolver.
///
/// Lives in the node slot while the node is `InProgress`, so a second
/// trigger can see the run and back off.
#[derive(Debug)]
pub(crate) struct Evaluation {
	node: NodeId,
	round: u64,
	reads: RefCell<FxHashMap<NodeId, Observed>>,
	stale: Cell<bool>,
}

impl Evaluation {
	pub fn new(node: NodeId, round: u64) -> Self {
		Evaluation {
			node,
			round,
			reads: RefCell::new(FxHashMap::default()),
			stale: Cell::new(false),
		}
	}

	pub fn node(&self) -> NodeId {
		self.node
	}

	pub fn round(&self) -> u64 {
		self.round
	}

	/// Keeps the oldest observation per dependee.
	pub fn observe(&self, dependee: NodeId, observed: Observed) {
		self.reads
			.borrow_mut()
			.entry(dependee)
			.and_modify(|prev| *prev = (*prev).min(observed))
			.or_insert(observed);
	}

	/// `current` yields the revision of a dependee if it is resolved right now.
	pub fn is_outdated(&self, current: impl Fn(NodeId) -> Option<u64>) -> bool {
		self.reads
			.borrow()
			.iter()
			.any(|(dependee, observed)| match (observed, current(*dependee)) {
				(_, None) => false,
				(Observed::Fallback, Some(_)) => true,
				(Observed::Revision(seen), Some(revision)) => *seen != revision,
			})
	}

	pub fn mark_stale(&self) {
		self.stale.set(true)
	}

	pub fn is_stale(&self) -> bool {
		self.stale.get()
	}

	pub fn take_reads(&self) -> FxHashMap<NodeId, Observed> {
		std::mem::take(&mut *self.reads.borrow_mut())
	}
}

/// Evaluation state of a node as stored by the graph.
pub(crate) enum Slot {
	Unstarted,
	InProgress(Rc<Evaluation>),
	Resolved(Rc<dyn Any>),
	Failed(Rc<ResolverFailure>),
}

impl Slot {
	pub fn is_running(&self, evaluation: &Evaluation) -> bool {
		matches!(self, Slot::InProgress(current) if std::ptr::eq(Rc::as_ptr(current), evaluation))
	}

	pub fn view<T: Clone + 'static>(&self) -> State<T> {
		match self {
			Slot::Unstarted => State::Unstarted,
			Slot::InProgress(_) => State::InProgress,
			Slot::Resolved(value) => match value.downcast_ref::<T>() {
				Some(value) => State::Resolved(value.clone()),
				None => State::Unstarted,
			},
			Slot::Failed(failure) => State::Failed(failure.clone()),
		}
	}
}

/// Snapshot of a node's evaluation state.
#[derive(Debug, Clone)]
pub enum State<T> {
	Unstarted,
	InProgress,
	Resolved(T),
	Failed(Rc<ResolverFailure>),
}

impl<T> State<T> {
	pub fn is_resolved(&self) -> bool {
		matches!(self, State::Resolved(_))
	}

	pub fn is_failed(&self) -> bool {
		matches!(self, State::Failed(_))
	}

	pub fn resolved(self) -> Option<T> {
		match self {
			State::Resolved(value) => Some(value),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_oldest_observation() {
		let (a, b) = (NodeId::next(), NodeId::next());
		let evaluation = Evaluation::new(b, 1);

		evaluation.observe(a, Observed::Revision(3));
		evaluation.observe(a, Observed::Fallback);
		evaluation.observe(a, Observed::Revision(4));

		assert_eq!(evaluation.take_reads().get(&a), Some(&Observed::Fallback));
	}

	#[test]
	fn outdated_only_when_input_resolved_since() {
		let (a, b) = (NodeId::next(), NodeId::next());
		let evaluation = Evaluation::new(b, 1);
		evaluation.observe(a, Observed::Revision(1));

		assert!(!evaluation.is_outdated(|_| None));
		assert!(!evaluation.is_outdated(|_| Some(1)));
		assert!(evaluation.is_outdated(|_| Some(2)));
	}
}
