use crate::context::{NodeContext, NodeExecutor, NodeOutputs};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use wavecore::{NodeContract, NodeError, NodeKey};

/// Implementation of one node kind
#[async_trait]
pub trait NodeHandler<K, V>: Send + Sync {
    /// Kind identifier matched against [`NodeContract::kind`] (e.g. "script", "regex")
    fn kind(&self) -> &str;

    /// Run a node of this kind. The node's `config` is reachable through `ctx.node`.
    async fn execute(
        &self,
        ctx: NodeContext<NodeContract<K>, V>,
    ) -> Result<NodeOutputs<V>, NodeError>;

    /// Optional: reject a contract before any run starts
    fn validate(&self, _node: &NodeContract<K>) -> Result<(), NodeError> {
        Ok(())
    }

    /// Optional: describe the kind for tooling
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::default()
    }
}

/// Metadata about a node kind
#[derive(Debug, Clone)]
pub struct HandlerMetadata {
    pub description: String,
    pub category: String,
    pub inputs: Vec<PortDefinition>,
    pub outputs: Vec<PortDefinition>,
}

impl Default for HandlerMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Node executor that dispatches on [`NodeContract::kind`].
pub struct NodeRegistry<K, V> {
    handlers: HashMap<String, Arc<dyn NodeHandler<K, V>>>,
}

impl<K: NodeKey, V: Send + 'static> NodeRegistry<K, V> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any earlier one for the same kind.
    pub fn register(&mut self, handler: Arc<dyn NodeHandler<K, V>>) {
        let kind = handler.kind().to_string();
        tracing::info!("Registering node kind: {}", kind);
        if self.handlers.insert(kind.clone(), handler).is_some() {
            tracing::warn!("Node kind '{}' was already registered, replaced", kind);
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// All registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn metadata(&self, kind: &str) -> Option<HandlerMetadata> {
        self.handlers.get(kind).map(|h| h.metadata())
    }

    /// Check every contract against its handler before running anything.
    ///
    /// Returns the first problem found, tagged with the offending node.
    pub fn validate(&self, nodes: &[NodeContract<K>]) -> Result<(), (K, NodeError)> {
        for node in nodes {
            let handler = self
                .handlers
                .get(&node.kind)
                .ok_or_else(|| (node.id.clone(), NodeError::UnknownKind(node.kind.clone())))?;
            handler
                .validate(node)
                .map_err(|e| (node.id.clone(), e))?;
        }
        Ok(())
    }
}

impl<K: NodeKey, V: Send + 'static> Default for NodeRegistry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> NodeExecutor<NodeContract<K>, V> for NodeRegistry<K, V>
where
    K: NodeKey,
    V: Send + 'static,
{
    async fn execute(
        &self,
        ctx: NodeContext<NodeContract<K>, V>,
    ) -> Result<NodeOutputs<V>, NodeError> {
        let handler = self
            .handlers
            .get(&ctx.node.kind)
            .ok_or_else(|| NodeError::UnknownKind(ctx.node.kind.clone()))?;
        handler.execute(ctx).await
    }
}
