use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wavecore::{EventEmitter, GraphNode, NodeError};

/// Values handed to a node, keyed by its input port names.
///
/// `None` means the port has no value: either nothing is wired to it, or its
/// source never published one.
pub type NodeInputs<V> = HashMap<String, Option<V>>;

/// Values a node publishes, keyed by its output port names.
pub type NodeOutputs<V> = HashMap<String, V>;

/// Everything a node gets when it runs
pub struct NodeContext<N, V> {
    /// The node being executed
    pub node: Arc<N>,

    /// Input values assembled from connections targeting this node
    pub inputs: NodeInputs<V>,

    /// Cancelled when the run is cancelled or a sibling in the same batch fails
    pub cancellation: CancellationToken,

    /// Event emitter for real-time updates
    pub events: EventEmitter,
}

impl<N: GraphNode, V> NodeContext<N, V> {
    /// Context outside any run, mostly useful for exercising a node directly.
    pub fn new(node: Arc<N>) -> Self {
        let events = EventEmitter::detached(node.id().to_string());
        Self {
            node,
            inputs: HashMap::new(),
            cancellation: CancellationToken::new(),
            events,
        }
    }

    pub fn with_input(mut self, port: impl Into<String>, value: Option<V>) -> Self {
        self.inputs.insert(port.into(), value);
        self
    }

    pub fn node_id(&self) -> &N::Id {
        self.node.id()
    }
}

impl<N, V> NodeContext<N, V> {
    /// Input value, or `None` when the port is absent or carries no value.
    pub fn input(&self, port: &str) -> Option<&V> {
        self.inputs.get(port).and_then(Option::as_ref)
    }

    /// Input value or a [`NodeError::MissingInput`].
    pub fn require_input(&self, port: &str) -> Result<&V, NodeError> {
        self.input(port)
            .ok_or_else(|| NodeError::MissingInput(port.to_string()))
    }

    /// Move an input value out of the context.
    pub fn take_input(&mut self, port: &str) -> Option<V> {
        self.inputs.get_mut(port).and_then(Option::take)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// `Err(NodeError::Cancelled)` once cancellation was requested, for use
    /// with `?` between steps of a long-running node.
    pub fn check_cancelled(&self) -> Result<(), NodeError> {
        if self.is_cancelled() {
            Err(NodeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Runs one node. This is where a host plugs in its actual computation.
#[async_trait]
pub trait NodeExecutor<N, V>: Send + Sync {
    async fn execute(&self, ctx: NodeContext<N, V>) -> Result<NodeOutputs<V>, NodeError>;
}

#[async_trait]
impl<N, V, F, Fut> NodeExecutor<N, V> for F
where
    N: Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(NodeContext<N, V>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<NodeOutputs<V>, NodeError>> + Send,
{
    async fn execute(&self, ctx: NodeContext<N, V>) -> Result<NodeOutputs<V>, NodeError> {
        (self)(ctx).await
    }
}
