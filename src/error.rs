use futures::task::SpawnError;

use crate::NodeId;

/// Error type resolvers are allowed to fail with.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Errors returned to code driving the graph from the outside.
///
/// Resolver failures never show up here, they are captured into the
/// node state as [`ResolverFailure`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("node {0} does not belong to this graph")]
	UnknownNode(NodeId),

	#[error("failed to schedule evaluation: {0}")]
	Spawn(#[from] SpawnError),

	#[error("graph was dropped")]
	Dropped,
}

/// Why a node ended up `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum Cause {
	#[error("{0}")]
	Error(BoxError),

	#[error("resolver panicked: {0}")]
	Panic(String),

	#[error("evaluation could not be scheduled: {0}")]
	Unscheduled(SpawnError),
}

#[derive(Debug, thiserror::Error)]
#[error("node {node} failed to resolve: {cause}")]
pub struct ResolverFailure {
	pub node: NodeId,
	#[source]
	pub cause: Cause,
}

impl ResolverFailure {
	pub(crate) fn new(node: NodeId, cause: Cause) -> Self {
		ResolverFailure { node, cause }
	}

	pub(crate) fn panic(node: NodeId, payload: Box<dyn std::any::Any + Send>) -> Self {
		let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
			(*message).to_owned()
		} else if let Some(message) = payload.downcast_ref::<String>() {
			message.clone()
		} else {
			String::from("<non-string panic payload>")
		};

		ResolverFailure::new(node, Cause::Panic(message))
	}
}
