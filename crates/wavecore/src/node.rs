use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

/// Identifier type usable for graph nodes.
///
/// Blanket-implemented, so `String`, `&'static str`, `u32` and `Uuid` all
/// qualify without ceremony.
pub trait NodeKey: Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> NodeKey for T where T: Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// A unit the engine can wire and schedule.
///
/// The engine only ever looks at the identifier and the declared port names;
/// what the node actually does is up to the executor the host passes in.
pub trait GraphNode: Send + Sync {
    type Id: NodeKey;

    /// Identifier, unique within one execution.
    fn id(&self) -> &Self::Id;

    /// Names of the ports this node consumes, in declaration order.
    fn input_ports(&self) -> &[String];

    /// Names of the ports this node produces, in declaration order.
    fn output_ports(&self) -> &[String];
}

/// Declarative description of one configured computation unit.
///
/// `kind` and `config` replace any runtime type inspection: a host maps
/// `kind` onto a handler and hands it `config` when the node runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContract<K> {
    pub id: K,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

impl<K> NodeContract<K> {
    pub fn new(id: K, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            label: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            config: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Declare an input port. Declaring the same name twice is a no-op.
    pub fn with_input(mut self, port: impl Into<String>) -> Self {
        push_unique(&mut self.inputs, port.into());
        self
    }

    pub fn with_inputs<I, S>(mut self, ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for port in ports {
            push_unique(&mut self.inputs, port.into());
        }
        self
    }

    /// Declare an output port. Declaring the same name twice is a no-op.
    pub fn with_output(mut self, port: impl Into<String>) -> Self {
        push_unique(&mut self.outputs, port.into());
        self
    }

    pub fn with_outputs<I, S>(mut self, ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for port in ports {
            push_unique(&mut self.outputs, port.into());
        }
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Config value, if set.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// True when the node both consumes and produces `port`, i.e. it updates
    /// a value in place rather than shadowing it.
    pub fn passes_through(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p == port) && self.outputs.iter().any(|p| p == port)
    }
}

impl<K: NodeKey> GraphNode for NodeContract<K> {
    type Id = K;

    fn id(&self) -> &K {
        &self.id
    }

    fn input_ports(&self) -> &[String] {
        &self.inputs
    }

    fn output_ports(&self) -> &[String] {
        &self.outputs
    }
}

fn push_unique(ports: &mut Vec<String>, port: String) {
    if !ports.contains(&port) {
        ports.push(port);
    }
}
