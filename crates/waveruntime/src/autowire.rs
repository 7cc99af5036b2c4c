//! Connection inference from node order and port names.

use std::collections::{HashMap, HashSet};
use wavecore::{Connection, Endpoint, GraphNode, NodeKey, WiringError};

/// Infer the connections for `nodes_in_order` by matching port names.
///
/// The slice must already be a legal execution order; it is never reordered.
/// Each input port is wired to the most recent earlier producer of the same
/// name. A node may only produce a name that an earlier node already produced
/// if it also consumes that name, which marks it as an update of the value
/// rather than an accidental shadowing of it.
///
/// The pass is deterministic: the same nodes with the same port declarations
/// always yield the same list, in the same order. Nothing is returned on
/// failure, not even the connections found before the offending node.
pub fn try_auto_connect<N>(nodes_in_order: &[N]) -> Result<Vec<Connection<N::Id>>, WiringError>
where
    N: GraphNode,
{
    auto_connect(
        nodes_in_order
            .iter()
            .map(|node| (node.id(), node.input_ports(), node.output_ports())),
    )
}

/// Port-level view shared by [`try_auto_connect`] and request wiring, which
/// also has to wire a virtual input node that is not an `N`.
pub(crate) fn auto_connect<'a, K, I>(nodes: I) -> Result<Vec<Connection<K>>, WiringError>
where
    K: NodeKey,
    I: IntoIterator<Item = (&'a K, &'a [String], &'a [String])>,
{
    let mut connections = Vec::new();
    let mut available: HashMap<&'a str, Endpoint<K>> = HashMap::new();

    for (node_id, inputs, outputs) in nodes {
        let mut consumed: HashSet<&str> = HashSet::with_capacity(inputs.len());

        for port in inputs {
            if !consumed.insert(port.as_str()) {
                continue;
            }
            let source = available
                .get(port.as_str())
                .ok_or_else(|| WiringError::MissingSource {
                    node: node_id.to_string(),
                    port: port.clone(),
                })?;
            connections.push(Connection::new(
                source.clone(),
                Endpoint::new(node_id.clone(), port.as_str()),
            ));
        }

        let mut produced: HashSet<&str> = HashSet::with_capacity(outputs.len());
        for port in outputs {
            if !produced.insert(port.as_str()) {
                continue;
            }
            if let Some(previous) = available.get(port.as_str()) {
                if !consumed.contains(port.as_str()) {
                    return Err(WiringError::ImplicitOverwrite {
                        node: node_id.to_string(),
                        port: port.clone(),
                        previous: previous.node.to_string(),
                    });
                }
            }
            available.insert(port.as_str(), Endpoint::new(node_id.clone(), port.as_str()));
        }
    }

    tracing::debug!("Auto-wired {} connections", connections.len());
    Ok(connections)
}
