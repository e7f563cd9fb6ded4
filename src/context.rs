use std::rc::{Rc, Weak};

use crate::evaluation::Evaluation;
use crate::graph::GraphBody;
use crate::{Node, NodeId};

/// Read capability handed to a resolver.
///
/// Reads never suspend. A target that is not resolved yet yields `None`
/// (or the given fallback), and the resolver is evaluated again once the
/// target resolves.
#[derive(Clone)]
pub struct Context {
	graph: Weak<GraphBody>,
	evaluation: Rc<Evaluation>,
}

impl Context {
	pub(crate) fn new(graph: Weak<GraphBody>, evaluation: Rc<Evaluation>) -> Self {
		Context { graph, evaluation }
	}

	/// Node this resolver is computing.
	pub fn node(&self) -> NodeId {
		self.evaluation.node()
	}

	pub fn get<T>(&self, node: impl AsRef<Node<T>>) -> Option<T>
	where
		T: Clone + 'static,
	{
		self.with(node, T::clone)
	}

	#[inline]
	pub fn get_or<T>(&self, node: impl AsRef<Node<T>>, fallback: T) -> T
	where
		T: Clone + 'static,
	{
		self.get(node).unwrap_or(fallback)
	}

	#[inline]
	pub fn get_or_default<T>(&self, node: impl AsRef<Node<T>>) -> T
	where
		T: Clone + Default + 'static,
	{
		self.get(node).unwrap_or_default()
	}

	/// Borrows the resolved value instead of cloning it.
	pub fn with<T, R>(&self, node: impl AsRef<Node<T>>, func: impl FnOnce(&T) -> R) -> Option<R>
	where
		T: 'static,
	{
		let graph = self.graph.upgrade()?;
		let value = graph.read(&self.evaluation, node.as_ref().id())?;
		value.downcast_ref::<T>().map(func)
	}
}

impl AsRef<Context> for Context {
	fn as_ref(&self) -> &Context {
		self
	}
}
