use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(node, port)` pair. Addresses exactly one value in a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint<K> {
    pub node: K,
    pub port: String,
}

impl<K> Endpoint<K> {
    pub fn new(node: K, port: impl Into<String>) -> Self {
        Self {
            node,
            port: port.into(),
        }
    }
}

impl<K: fmt::Display> fmt::Display for Endpoint<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// Directed wiring from a producer's output port to a consumer's input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection<K> {
    pub source: Endpoint<K>,
    pub target: Endpoint<K>,
}

impl<K> Connection<K> {
    pub fn new(source: Endpoint<K>, target: Endpoint<K>) -> Self {
        Self { source, target }
    }

    /// Shorthand for `Connection::new(Endpoint::new(..), Endpoint::new(..))`.
    pub fn between(
        from_node: K,
        from_port: impl Into<String>,
        to_node: K,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            source: Endpoint::new(from_node, from_port),
            target: Endpoint::new(to_node, to_port),
        }
    }
}

impl<K: fmt::Display> fmt::Display for Connection<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}
