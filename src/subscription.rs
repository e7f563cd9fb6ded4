use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::graph::GraphBody;
use crate::NodeId;

/// Observer callback together with the values it has not seen yet.
pub(crate) struct Listener {
	on_change: RefCell<Box<dyn FnMut(&dyn Any)>>,
	pending: RefCell<VecDeque<Rc<dyn Any>>>,
}

pub(crate) type Listeners = SmallVec<[Rc<Listener>; 1]>;

pub(crate) fn listener<T, F>(mut on_change: F) -> Rc<Listener>
where
	T: 'static,
	F: FnMut(&T) + 'static,
{
	Rc::new(Listener {
		on_change: RefCell::new(Box::new(move |value: &dyn Any| {
			if let Some(value) = value.downcast_ref::<T>() {
				on_change(value)
			}
		})),
		pending: RefCell::new(VecDeque::new()),
	})
}

impl Listener {
	/// Values published while the callback is running are queued and
	/// delivered in order by the outermost call once it returns.
	fn deliver(&self, node: NodeId, value: Rc<dyn Any>) {
		self.pending.borrow_mut().push_back(value);

		let Ok(mut on_change) = self.on_change.try_borrow_mut() else {
			tracing::trace!(node = %node, "subscriber is running, delivery queued");
			return;
		};

		loop {
			let next = self.pending.borrow_mut().pop_front();
			let Some(value) = next else {
				break;
			};
			(*on_change)(&*value);
		}
	}
}

/// Observers registered per node.
#[derive(Default)]
pub(crate) struct Subscribers {
	next: u64,
	by_node: FxHashMap<NodeId, SmallVec<[(u64, Rc<Listener>); 1]>>,
}

impl Subscribers {
	pub fn insert(&mut self, node: NodeId, listener: Rc<Listener>) -> u64 {
		self.next += 1;
		self.by_node
			.entry(node)
			.or_default()
			.push((self.next, listener));
		self.next
	}

	pub fn remove(&mut self, node: NodeId, key: u64) -> bool {
		let Some(listeners) = self.by_node.get_mut(&node) else {
			return false;
		};

		let len = listeners.len();
		listeners.retain(|(k, _)| *k != key);
		let removed = listeners.len() != len;
		if listeners.is_empty() {
			self.by_node.remove(&node);
		}

		removed
	}

	pub fn listeners(&self, node: NodeId) -> Listeners {
		self.by_node
			.get(&node)
			.map(|listeners| listeners.iter().map(|(_, l)| l.clone()).collect())
			.unwrap_or_default()
	}

	pub fn count(&self, node: NodeId) -> usize {
		self.by_node.get(&node).map_or(0, |listeners| listeners.len())
	}
}

/// Must be called with no graph borrow held.
pub(crate) fn publish(node: NodeId, listeners: &[Rc<Listener>], value: &Rc<dyn Any>) {
	for listener in listeners {
		listener.deliver(node, value.clone());
	}
}

/// Binding of one observer to one node.
///
/// Dropping the subscription removes the observer.
#[must_use = "dropping a subscription unsubscribes it"]
pub struct Subscription {
	graph: Weak<GraphBody>,
	node: NodeId,
	key: u64,
	active: bool,
}

impl Subscription {
	pub(crate) fn new(graph: Weak<GraphBody>, node: NodeId, key: u64) -> Self {
		Subscription {
			graph,
			node,
			key,
			active: true,
		}
	}

	pub fn node(&self) -> NodeId {
		self.node
	}

	pub fn unsubscribe(mut self) {
		self.detach();
	}

	/// Keeps the observer registered for the lifetime of the graph.
	pub fn forget(mut self) {
		self.active = false;
	}

	fn detach(&mut self) {
		if !std::mem::replace(&mut self.active, false) {
			return;
		}

		if let Some(graph) = self.graph.upgrade() {
			graph.unsubscribe(self.node, self.key);
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.detach();
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("node", &self.node)
			.field("active", &self.active)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use super::*;

	#[test]
	fn delivers_only_matching_type() {
		let seen = Rc::new(Cell::new(0));
		let l = listener::<u32, _>({
			let seen = seen.clone();
			move |value| seen.set(*value)
		});

		let node = NodeId::next();
		publish(node, &[l.clone()], &(Rc::new(7u32) as Rc<dyn Any>));
		publish(node, &[l], &(Rc::new("seven") as Rc<dyn Any>));

		assert_eq!(seen.get(), 7);
	}

	#[test]
	fn nested_delivery_is_queued() {
		let node = NodeId::next();
		let seen = Rc::new(RefCell::new(Vec::new()));
		let this: Rc<RefCell<Option<Rc<Listener>>>> = Rc::default();

		let l = listener::<u32, _>({
			let (seen, this) = (seen.clone(), this.clone());
			move |value| {
				seen.borrow_mut().push(*value);
				if *value < 3 {
					let this = this.borrow().clone();
					if let Some(this) = this {
						publish(node, &[this], &(Rc::new(*value + 1) as Rc<dyn Any>));
					}
				}
			}
		});
		*this.borrow_mut() = Some(l.clone());

		publish(node, &[l], &(Rc::new(1u32) as Rc<dyn Any>));
		*this.borrow_mut() = None;

		assert_eq!(*seen.borrow(), vec![1, 2, 3]);
	}

	#[test]
	fn remove_by_key() {
		let node = NodeId::next();
		let mut subscribers = Subscribers::default();

		let a = subscribers.insert(node, listener::<u32, _>(|_| {}));
		let b = subscribers.insert(node, listener::<u32, _>(|_| {}));
		assert_eq!(subscribers.count(node), 2);

		assert!(subscribers.remove(node, a));
		assert!(!subscribers.remove(node, a));
		assert_eq!(subscribers.count(node), 1);

		assert!(subscribers.remove(node, b));
		assert!(subscribers.listeners(node).is_empty());
	}
}
