use std::any::Any;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::{Rc, Weak};

use futures::future::FutureExt;
use futures::task::{LocalSpawn, LocalSpawnExt, SpawnError};
use fxhash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

use crate::dependencies::{Dependencies, Dependents};
use crate::evaluation::{Evaluation, Observed, Slot};
use crate::node::{Kind, Resolve};
use crate::subscription::{self, Subscribers};
use crate::{
	BoxError, Cause, Context, Definition, EdgePolicy, Error, Node, NodeId, Options,
	ResolverFailure, ResolverFn, State, Subscription, Var,
};

/// Dependency graph of atoms.
///
/// Evaluation runs as tasks on the single-threaded executor given at
/// construction; nothing happens until that executor is driven.
#[derive(Clone)]
pub struct Graph {
	body: Rc<GraphBody>,
}

pub(crate) struct GraphBody {
	spawner: Box<dyn LocalSpawn>,
	options: Options,
	inner: RefCell<GraphInner>,
	this: Weak<GraphBody>,
}

#[derive(Default)]
struct GraphInner {
	nodes: FxHashMap<NodeId, NodeRecord>,
	dependents: Dependents,
	subscribers: Subscribers,
}

struct NodeRecord {
	kind: Kind,
	slot: Slot,
	/// Bumped on every transition into `Resolved`.
	revision: u64,
	/// Bumped on every transition into `InProgress`.
	round: u64,
	dependencies: Dependencies,
}

impl NodeRecord {
	fn resolved_revision(&self) -> Option<u64> {
		match self.slot {
			Slot::Resolved(_) => Some(self.revision),
			_ => None,
		}
	}
}

impl GraphInner {
	fn resolved_revision(&self, node: NodeId) -> Option<u64> {
		self.nodes.get(&node).and_then(NodeRecord::resolved_revision)
	}
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum Trigger {
	/// Subscription, explicit request, first read or rerun.
	External,
	/// A dependee resolved.
	Cascade,
}

enum Outcome {
	Resolved(Rc<dyn Any>),
	Failed(ResolverFailure),
}

impl Graph {
	pub fn new(spawner: impl LocalSpawn + 'static) -> Self {
		Self::with_options(spawner, Options::default())
	}

	pub fn with_options(spawner: impl LocalSpawn + 'static, options: Options) -> Self {
		Graph {
			body: Rc::new_cyclic(|this| GraphBody {
				spawner: Box::new(spawner),
				options,
				inner: RefCell::new(GraphInner::default()),
				this: this.clone(),
			}),
		}
	}

	pub fn options(&self) -> Options {
		self.body.options
	}

	/// Defines a node. A [`Definition::Value`] node is a constant: it
	/// is resolved from the start and cannot be changed, use
	/// [`Graph::var`] for a settable root.
	pub fn define<T: 'static>(&self, definition: Definition<T>) -> Node<T> {
		let (kind, value) = definition.split();
		Node::new(self.body.insert(kind, value))
	}

	/// Defines a root node together with its setter.
	pub fn var<T: 'static>(&self, value: T) -> Var<T> {
		let node = self.define(Definition::Value(value));
		Var::new(node, self.body.this.clone())
	}

	pub fn computed<T, F, Fut>(&self, func: F) -> Node<T>
	where
		T: 'static,
		F: Fn(Context) -> Fut + 'static,
		Fut: Future<Output = T> + 'static,
	{
		self.define(Definition::Resolver(ResolverFn::new(func)))
	}

	pub fn try_computed<T, E, F, Fut>(&self, func: F) -> Node<T>
	where
		T: 'static,
		E: Into<BoxError> + 'static,
		F: Fn(Context) -> Fut + 'static,
		Fut: Future<Output = Result<T, E>> + 'static,
	{
		self.define(Definition::Resolver(ResolverFn::fallible(func)))
	}

	/// Starts evaluating `node` unless it is already in progress.
	pub fn evaluate<T>(&self, node: impl AsRef<Node<T>>) -> Result<(), Error> {
		self.body.evaluate(node.as_ref().id(), Trigger::External)
	}

	/// Binds `on_change` to every resolution of exactly `node`.
	///
	/// Derived nodes are evaluated right away. Root nodes deliver their
	/// current value immediately and then every new value set.
	pub fn subscribe<T, F>(&self, node: impl AsRef<Node<T>>, on_change: F) -> Result<Subscription, Error>
	where
		T: 'static,
		F: FnMut(&T) + 'static,
	{
		let id = node.as_ref().id();
		let listener = subscription::listener(on_change);

		let (key, current) = {
			let mut inner = self.body.inner.borrow_mut();
			let record = inner.nodes.get(&id).ok_or(Error::UnknownNode(id))?;
			let current = match (&record.kind, &record.slot) {
				(Kind::Const, Slot::Resolved(value)) => Some(value.clone()),
				_ => None,
			};
			(inner.subscribers.insert(id, listener.clone()), current)
		};

		let subscription = Subscription::new(self.body.this.clone(), id, key);
		debug!(node = %id, "subscribed");

		match current {
			Some(value) => subscription::publish(id, &[listener], &value),
			None => self.body.evaluate(id, Trigger::External)?,
		}

		Ok(subscription)
	}

	/// Current value without recording any dependency or starting an
	/// evaluation.
	pub fn get<T: Clone + 'static>(&self, node: impl AsRef<Node<T>>) -> Option<T> {
		let value = self.body.peek(node.as_ref().id())?;
		value.downcast_ref::<T>().cloned()
	}

	pub fn state<T: Clone + 'static>(&self, node: impl AsRef<Node<T>>) -> Result<State<T>, Error> {
		let id = node.as_ref().id();
		let inner = self.body.inner.borrow();
		let record = inner.nodes.get(&id).ok_or(Error::UnknownNode(id))?;
		Ok(record.slot.view())
	}

	/// Nodes that read `node` and are re-evaluated when it resolves.
	pub fn dependents_of<T>(&self, node: impl AsRef<Node<T>>) -> Vec<NodeId> {
		let inner = self.body.inner.borrow();
		inner.dependents.dependents_of(node.as_ref().id()).into_vec()
	}

	pub fn subscriber_count<T>(&self, node: impl AsRef<Node<T>>) -> usize {
		self.body.inner.borrow().subscribers.count(node.as_ref().id())
	}
}

impl GraphBody {
	fn insert(&self, kind: Kind, value: Option<Rc<dyn Any>>) -> NodeId {
		let id = NodeId::next();
		let (slot, revision) = match value {
			Some(value) => (Slot::Resolved(value), 1),
			None => (Slot::Unstarted, 0),
		};

		trace!(node = %id, constant = matches!(kind, Kind::Const), "node defined");
		self.inner.borrow_mut().nodes.insert(
			id,
			NodeRecord {
				kind,
				slot,
				revision,
				round: 0,
				dependencies: Dependencies::default(),
			},
		);

		id
	}

	fn evaluate(&self, id: NodeId, trigger: Trigger) -> Result<(), Error> {
		let (evaluation, resolver, retired) = {
			let mut inner = self.inner.borrow_mut();
			let record = inner.nodes.get(&id).ok_or(Error::UnknownNode(id))?;

			let resolver = match &record.kind {
				Kind::Const => return Ok(()),
				Kind::Resolver(resolver) => resolver.clone(),
			};

			if let Slot::InProgress(running) = &record.slot {
				if trigger == Trigger::Cascade && running.is_outdated(|n| inner.resolved_revision(n)) {
					debug!(node = %id, round = running.round(), "inputs changed under a running evaluation");
					running.mark_stale();
				}
				return Ok(());
			}

			let Some(record) = inner.nodes.get_mut(&id) else {
				return Err(Error::UnknownNode(id));
			};

			record.round += 1;
			let evaluation = Rc::new(Evaluation::new(id, record.round));
			let retired = std::mem::replace(&mut record.slot, Slot::InProgress(evaluation.clone()));
			(evaluation, resolver, retired)
		};

		// Values may own handles into this graph.
		drop(retired);

		debug!(node = %id, round = evaluation.round(), ?trigger, "evaluation started");

		if let Err(spawn) = self.spawn(evaluation.clone(), resolver) {
			error!(node = %id, error = %spawn, "failed to schedule evaluation");
			let failure = ResolverFailure::new(id, Cause::Unscheduled(SpawnError::shutdown()));
			self.settle(&evaluation, Outcome::Failed(failure));
			return Err(Error::Spawn(spawn));
		}

		Ok(())
	}

	fn spawn(&self, evaluation: Rc<Evaluation>, resolver: Rc<dyn Resolve>) -> Result<(), SpawnError> {
		let graph = self.this.clone();
		let cx = Context::new(graph.clone(), evaluation.clone());
		let node = evaluation.node();

		self.spawner.spawn_local(async move {
			let result = AssertUnwindSafe(async move { resolver.resolve(cx).await })
				.catch_unwind()
				.await;

			let outcome = match result {
				Ok(Ok(value)) => Outcome::Resolved(value),
				Ok(Err(error)) => Outcome::Failed(ResolverFailure::new(node, Cause::Error(error))),
				Err(payload) => Outcome::Failed(ResolverFailure::panic(node, payload)),
			};

			if let Some(graph) = graph.upgrade() {
				graph.settle(&evaluation, outcome);
			}
		})
	}

	fn settle(&self, evaluation: &Rc<Evaluation>, outcome: Outcome) {
		let id = evaluation.node();

		let (published, stale, retired) = {
			let mut inner = self.inner.borrow_mut();
			let inner = &mut *inner;

			let Some(record) = inner.nodes.get_mut(&id) else {
				return;
			};

			if !record.slot.is_running(evaluation) {
				warn!(node = %id, round = evaluation.round(), "evaluation is no longer current");
				return;
			}

			let reads = evaluation.take_reads();
			let dropped = record.dependencies.swap(reads.keys().copied().collect());

			let (slot, value) = match outcome {
				Outcome::Resolved(value) => {
					record.revision += 1;
					debug!(node = %id, revision = record.revision, "resolved");
					(Slot::Resolved(value.clone()), Some(value))
				}
				Outcome::Failed(failure) => {
					debug!(node = %id, error = %failure, "failed");
					(Slot::Failed(Rc::new(failure)), None)
				}
			};
			let retired = std::mem::replace(&mut record.slot, slot);

			if self.options.edges == EdgePolicy::Prune {
				for dependee in dropped {
					if inner.dependents.prune(dependee, id, evaluation.round()) {
						trace!(dependee = %dependee, depender = %id, "edge pruned");
					}
				}
			}

			let published = value.map(|value| {
				(
					value,
					inner.dependents.dependents_of(id),
					inner.subscribers.listeners(id),
				)
			});

			(published, evaluation.is_stale(), retired)
		};

		drop(retired);

		if let Some((value, dependents, listeners)) = published {
			self.cascade(id, dependents);
			subscription::publish(id, &listeners, &value);
		}

		if stale {
			debug!(node = %id, "evaluating again with fresh inputs");
			if let Err(error) = self.evaluate(id, Trigger::External) {
				warn!(node = %id, %error, "rerun failed");
			}
		}
	}

	fn cascade(&self, from: NodeId, dependents: SmallVec<[NodeId; 4]>) {
		for dependent in dependents {
			trace!(dependee = %from, depender = %dependent, "cascade");
			if let Err(error) = self.evaluate(dependent, Trigger::Cascade) {
				warn!(node = %dependent, %error, "cascade failed");
			}
		}
	}

	/// Backs [`Context::with`]. Never suspends and never fails.
	pub(crate) fn read(&self, evaluation: &Evaluation, target: NodeId) -> Option<Rc<dyn Any>> {
		let caller = evaluation.node();

		let (value, start) = {
			let mut inner = self.inner.borrow_mut();
			let inner = &mut *inner;

			let Some(record) = inner.nodes.get(&target) else {
				warn!(node = %target, "read of a node from another graph");
				return None;
			};

			let (value, observed, start) = match &record.slot {
				Slot::Resolved(value) => (Some(value.clone()), Observed::Revision(record.revision), false),
				Slot::Unstarted => (None, Observed::Fallback, true),
				Slot::InProgress(_) | Slot::Failed(_) => (None, Observed::Fallback, false),
			};

			let live = inner
				.nodes
				.get(&caller)
				.map_or(false, |record| record.slot.is_running(evaluation));

			if live && target != caller {
				evaluation.observe(target, observed);
				if inner.dependents.record(target, caller, evaluation.round()) {
					trace!(dependee = %target, depender = %caller, "edge recorded");
				}
			}

			(value, start)
		};

		if start {
			if let Err(error) = self.evaluate(target, Trigger::External) {
				warn!(node = %target, %error, "could not start evaluation");
			}
		}

		value
	}

	/// Overwrites a root value and forwards it like a resolution.
	///
	/// Only [`Var`] calls this, and a `Var` always points at a constant
	/// node of this graph.
	pub(crate) fn set(&self, id: NodeId, value: Rc<dyn Any>) -> Result<Option<Rc<dyn Any>>, Error> {
		let (previous, dependents, listeners) = {
			let mut inner = self.inner.borrow_mut();
			let inner = &mut *inner;

			let record = inner
				.nodes
				.get_mut(&id)
				.filter(|record| matches!(record.kind, Kind::Const))
				.ok_or(Error::UnknownNode(id))?;

			let previous = match std::mem::replace(&mut record.slot, Slot::Resolved(value.clone())) {
				Slot::Resolved(previous) => Some(previous),
				_ => None,
			};
			record.revision += 1;
			debug!(node = %id, revision = record.revision, "root set");

			(
				previous,
				inner.dependents.dependents_of(id),
				inner.subscribers.listeners(id),
			)
		};

		self.cascade(id, dependents);
		subscription::publish(id, &listeners, &value);

		Ok(previous)
	}

	pub(crate) fn peek(&self, id: NodeId) -> Option<Rc<dyn Any>> {
		match &self.inner.borrow().nodes.get(&id)?.slot {
			Slot::Resolved(value) => Some(value.clone()),
			_ => None,
		}
	}

	pub(crate) fn unsubscribe(&self, node: NodeId, key: u64) {
		match self.inner.try_borrow_mut() {
			Ok(mut inner) => {
				if inner.subscribers.remove(node, key) {
					debug!(node = %node, "unsubscribed");
				}
			}
			Err(_) => warn!(node = %node, "graph is busy, subscription leaked"),
		}
	}
}

impl std::fmt::Debug for Graph {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.body.inner.borrow();
		f.debug_struct("Graph")
			.field("nodes", &inner.nodes.len())
			.field("edges", &inner.dependents.len())
			.field("options", &self.body.options)
			.finish()
	}
}
