use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::graph::GraphBody;
use crate::{Error, Node};

/// Root node together with its setter.
///
/// Every new value is forwarded to the nodes that read this one, the
/// same way a resolver completion is.
pub struct Var<T> {
	node: Node<T>,
	graph: Weak<GraphBody>,
}

impl<T> Clone for Var<T> {
	fn clone(&self) -> Self {
		Self {
			node: self.node,
			graph: self.graph.clone(),
		}
	}
}

pub trait Toggle {
	fn toggle(&mut self);
}

impl Toggle for bool {
	fn toggle(&mut self) {
		*self = !*self
	}
}

impl<T> Var<T>
where
	T: 'static,
{
	pub(crate) fn new(node: Node<T>, graph: Weak<GraphBody>) -> Self {
		Var { node, graph }
	}

	#[inline]
	pub fn node(&self) -> Node<T> {
		self.node
	}

	fn graph(&self) -> Result<Rc<GraphBody>, Error> {
		self.graph.upgrade().ok_or(Error::Dropped)
	}

	pub fn get(&self) -> Option<T>
	where
		T: Clone,
	{
		let value = self.graph.upgrade()?.peek(self.node.id())?;
		value.downcast_ref::<T>().cloned()
	}

	#[inline]
	pub fn set(&self, value: T) -> Result<(), Error> {
		self.graph()?.set(self.node.id(), Rc::new(value))?;
		Ok(())
	}

	/// Sets a new value and hands back the previous one.
	pub fn replace(&self, value: T) -> Result<Option<T>, Error>
	where
		T: Clone,
	{
		let previous = self.graph()?.set(self.node.id(), Rc::new(value))?;
		Ok(previous
			.and_then(|previous| previous.downcast::<T>().ok())
			.map(|previous| Rc::try_unwrap(previous).unwrap_or_else(|rc| (*rc).clone())))
	}

	pub fn update(&self, func: impl FnOnce(&mut T)) -> Result<(), Error>
	where
		T: Clone,
	{
		let id = self.node.id();
		let current = self.graph()?.peek(id).ok_or(Error::UnknownNode(id))?;
		let mut value = current.downcast_ref::<T>().cloned().ok_or(Error::UnknownNode(id))?;
		func(&mut value);
		self.set(value)
	}

	#[inline]
	pub fn toggle(&self) -> Result<(), Error>
	where
		T: Toggle + Clone,
	{
		self.update(T::toggle)
	}
}

impl<T> AsRef<Node<T>> for Var<T> {
	fn as_ref(&self) -> &Node<T> {
		&self.node
	}
}

impl<T> From<Var<T>> for Node<T> {
	fn from(var: Var<T>) -> Self {
		var.node
	}
}

impl<T> Debug for Var<T>
where
	T: Clone + Debug + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Var")
			.field("node", &self.node.id())
			.field("value", &self.get())
			.finish()
	}
}
