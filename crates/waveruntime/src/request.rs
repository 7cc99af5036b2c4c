use crate::autowire::auto_connect;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use wavecore::{Connection, Endpoint, GraphNode, NodeKey, WiringError};

/// Hook applied to every output value before it is stored, and again to
/// every stored value handed to a consumer.
///
/// Typical use is deep-copying or freezing values whose `Clone` shares state,
/// so that consumers of the same produced value cannot see each other's
/// mutations.
pub type OutputPostProcess<V> = Arc<dyn Fn(V) -> V + Send + Sync>;

/// How the connections of a run are obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum Wiring<K> {
    /// Infer connections from node order and port names.
    Auto,
    /// Use exactly these connections, even if there are none.
    Explicit(Vec<Connection<K>>),
}

impl<K> Wiring<K> {
    /// Auto-wire when asked to, or when no connections were authored at all.
    pub fn infer(connections: Vec<Connection<K>>, enable_auto: bool) -> Self {
        if enable_auto || connections.is_empty() {
            Wiring::Auto
        } else {
            Wiring::Explicit(connections)
        }
    }
}

/// Virtual node standing for the caller-supplied inputs of a graph.
///
/// It takes part in auto-wiring as the first producer but is never executed:
/// its values are seeded into the store under its own ID.
#[derive(Debug, Clone)]
pub struct InputNode<K, V> {
    id: K,
    ports: Vec<String>,
    values: BTreeMap<String, V>,
}

impl<K, V> InputNode<K, V> {
    pub fn new(id: K, values: impl IntoIterator<Item = (String, V)>) -> Self {
        let values: BTreeMap<String, V> = values.into_iter().collect();
        Self {
            id,
            ports: values.keys().cloned().collect(),
            values,
        }
    }

    /// Declare a port that has no value; consumers receive `None`.
    pub fn with_empty_port(mut self, port: impl Into<String>) -> Self {
        let port = port.into();
        if !self.ports.contains(&port) {
            self.ports.push(port);
        }
        self
    }
}

impl<K: NodeKey, V: Send + Sync> GraphNode for InputNode<K, V> {
    type Id = K;

    fn id(&self) -> &K {
        &self.id
    }

    fn input_ports(&self) -> &[String] {
        &[]
    }

    fn output_ports(&self) -> &[String] {
        &self.ports
    }
}

/// Everything one run needs apart from the executor.
pub struct ExecutionRequest<N: GraphNode, V> {
    nodes: Vec<Arc<N>>,
    wiring: Wiring<N::Id>,
    input: Option<InputNode<N::Id, V>>,
    initial_data: HashMap<Endpoint<N::Id>, V>,
    post_process: Option<OutputPostProcess<V>>,
}

impl<N: GraphNode, V> ExecutionRequest<N, V> {
    /// Request for `nodes`, auto-wired in the given order unless connections
    /// are supplied.
    pub fn new(nodes: impl IntoIterator<Item = N>) -> Self {
        Self::from_shared(nodes.into_iter().map(Arc::new))
    }

    pub fn from_shared(nodes: impl IntoIterator<Item = Arc<N>>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
            wiring: Wiring::Auto,
            input: None,
            initial_data: HashMap::new(),
            post_process: None,
        }
    }

    pub fn with_connections(mut self, connections: Vec<Connection<N::Id>>) -> Self {
        self.wiring = Wiring::Explicit(connections);
        self
    }

    pub fn with_wiring(mut self, wiring: Wiring<N::Id>) -> Self {
        self.wiring = wiring;
        self
    }

    pub fn with_input_node(mut self, input: InputNode<N::Id, V>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_initial_value(mut self, endpoint: Endpoint<N::Id>, value: V) -> Self {
        self.initial_data.insert(endpoint, value);
        self
    }

    pub fn with_initial_data<I>(mut self, data: I) -> Self
    where
        I: IntoIterator<Item = (Endpoint<N::Id>, V)>,
    {
        self.initial_data.extend(data);
        self
    }

    pub fn with_output_post_process<F>(mut self, hook: F) -> Self
    where
        F: Fn(V) -> V + Send + Sync + 'static,
    {
        self.post_process = Some(Arc::new(hook));
        self
    }

    pub fn nodes(&self) -> &[Arc<N>] {
        &self.nodes
    }

    pub fn wiring(&self) -> &Wiring<N::Id> {
        &self.wiring
    }
}

impl<N: GraphNode, V: Send + Sync> ExecutionRequest<N, V> {
    /// Connections this request will run with.
    ///
    /// Auto-wiring sees the input node first, then the nodes in request order.
    pub fn resolve_connections(&self) -> Result<Vec<Connection<N::Id>>, WiringError> {
        match &self.wiring {
            Wiring::Explicit(connections) => Ok(connections.clone()),
            Wiring::Auto => {
                let input = self
                    .input
                    .iter()
                    .map(|node| (node.id(), node.input_ports(), node.output_ports()));
                let nodes = self
                    .nodes
                    .iter()
                    .map(|node| (node.id(), node.input_ports(), node.output_ports()));
                auto_connect(input.chain(nodes))
            }
        }
    }

    pub(crate) fn into_parts(self) -> RequestParts<N, V> {
        let mut initial_data = self.initial_data;
        if let Some(input) = self.input {
            for (port, value) in input.values {
                initial_data.insert(Endpoint::new(input.id.clone(), port), value);
            }
        }
        RequestParts {
            nodes: self.nodes,
            initial_data,
            post_process: self.post_process,
        }
    }
}

impl<N: GraphNode, V> fmt::Debug for ExecutionRequest<N, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRequest")
            .field(
                "nodes",
                &self.nodes.iter().map(|n| n.id()).collect::<Vec<_>>(),
            )
            .field("wiring", &self.wiring)
            .field("initial_data", &self.initial_data.len())
            .field("post_process", &self.post_process.is_some())
            .finish()
    }
}

pub(crate) struct RequestParts<N: GraphNode, V> {
    pub nodes: Vec<Arc<N>>,
    pub initial_data: HashMap<Endpoint<N::Id>, V>,
    pub post_process: Option<OutputPostProcess<V>>,
}
