use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{FutureExt, LocalBoxFuture};

use crate::{BoxError, Context};

/// Process-wide identity of a node.
///
/// Two nodes defined separately never share an id, even when they hold
/// equal values or identical resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
	pub(crate) fn next() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(1);
		NodeId(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Typed handle to a node of a [`Graph`](crate::Graph).
pub struct Node<T> {
	id: NodeId,
	_type: PhantomData<fn() -> T>,
}

impl<T> Node<T> {
	pub(crate) fn new(id: NodeId) -> Self {
		Node {
			id,
			_type: PhantomData,
		}
	}

	#[inline]
	pub fn id(&self) -> NodeId {
		self.id
	}
}

impl<T> Clone for Node<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for Node<T> {}

impl<T> PartialEq for Node<T> {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl<T> Eq for Node<T> {}

impl<T> Hash for Node<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state)
	}
}

impl<T> AsRef<Node<T>> for Node<T> {
	fn as_ref(&self) -> &Node<T> {
		self
	}
}

impl<T> fmt::Debug for Node<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Node").field(&self.id).finish()
	}
}

pub(crate) type Resolution = Result<Rc<dyn Any>, BoxError>;

/// Type-erased resolver stored in the graph.
pub(crate) trait Resolve {
	fn resolve(&self, cx: Context) -> LocalBoxFuture<'static, Resolution>;
}

struct Resolver<F, T, E> {
	func: F,
	_type: PhantomData<fn() -> (T, E)>,
}

impl<F, Fut, T, E> Resolve for Resolver<F, T, E>
where
	F: Fn(Context) -> Fut,
	Fut: Future<Output = Result<T, E>> + 'static,
	T: 'static,
	E: Into<BoxError> + 'static,
{
	fn resolve(&self, cx: Context) -> LocalBoxFuture<'static, Resolution> {
		(self.func)(cx)
			.map(|result| match result {
				Ok(value) => Ok(Rc::new(value) as Rc<dyn Any>),
				Err(error) => Err(error.into()),
			})
			.boxed_local()
	}
}

/// Resolver of a derived node producing values of type `T`.
pub struct ResolverFn<T> {
	resolve: Rc<dyn Resolve>,
	_type: PhantomData<fn() -> T>,
}

impl<T> ResolverFn<T>
where
	T: 'static,
{
	/// Resolver that always succeeds.
	pub fn new<F, Fut>(func: F) -> Self
	where
		F: Fn(Context) -> Fut + 'static,
		Fut: Future<Output = T> + 'static,
	{
		Self::fallible(move |cx| func(cx).map(Ok::<T, Infallible>))
	}

	/// Resolver whose error leaves the node `Failed`.
	pub fn fallible<F, Fut, E>(func: F) -> Self
	where
		F: Fn(Context) -> Fut + 'static,
		Fut: Future<Output = Result<T, E>> + 'static,
		E: Into<BoxError> + 'static,
	{
		ResolverFn {
			resolve: Rc::new(Resolver {
				func,
				_type: PhantomData,
			}),
			_type: PhantomData,
		}
	}
}

/// Everything a node can be defined from.
pub enum Definition<T> {
	/// Constant payload, resolved from the start.
	Value(T),
	/// Asynchronous function of other nodes.
	Resolver(ResolverFn<T>),
}

/// Kind of a node, fixed at construction.
pub(crate) enum Kind {
	Const,
	Resolver(Rc<dyn Resolve>),
}

impl<T: 'static> Definition<T> {
	pub(crate) fn split(self) -> (Kind, Option<Rc<dyn Any>>) {
		match self {
			Definition::Value(value) => (Kind::Const, Some(Rc::new(value))),
			Definition::Resolver(resolver) => (Kind::Resolver(resolver.resolve), None),
		}
	}
}
