//! Static checks of explicit connections against node declarations.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use wavecore::{Connection, GraphNode};

/// Something wrong with one authored connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ConnectionIssue<K> {
    UnknownSourceNode { connection: Connection<K> },
    UnknownTargetNode { connection: Connection<K> },
    UndeclaredSourcePort { connection: Connection<K> },
    UndeclaredTargetPort { connection: Connection<K> },
    /// More than one connection feeds the same input port; only the last is used.
    ConflictingTarget { connection: Connection<K> },
}

impl<K> ConnectionIssue<K> {
    pub fn connection(&self) -> &Connection<K> {
        match self {
            ConnectionIssue::UnknownSourceNode { connection }
            | ConnectionIssue::UnknownTargetNode { connection }
            | ConnectionIssue::UndeclaredSourcePort { connection }
            | ConnectionIssue::UndeclaredTargetPort { connection }
            | ConnectionIssue::ConflictingTarget { connection } => connection,
        }
    }
}

impl<K: fmt::Display> fmt::Display for ConnectionIssue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionIssue::UnknownSourceNode { connection } => {
                write!(f, "{}: source node does not exist", connection)
            }
            ConnectionIssue::UnknownTargetNode { connection } => {
                write!(f, "{}: target node does not exist", connection)
            }
            ConnectionIssue::UndeclaredSourcePort { connection } => {
                write!(f, "{}: source port is not a declared output", connection)
            }
            ConnectionIssue::UndeclaredTargetPort { connection } => {
                write!(f, "{}: target port is not a declared input", connection)
            }
            ConnectionIssue::ConflictingTarget { connection } => {
                write!(f, "{}: target port is already fed by another connection", connection)
            }
        }
    }
}

/// Check `connections` against the ports `nodes` declare.
///
/// Sources listed in `external` (for instance a virtual input node) are
/// accepted without a port check. An empty result means the wiring is sound;
/// cycles are not looked for here, see `DependencyGraph::topological_order`.
pub fn validate_connections<N: GraphNode>(
    nodes: &[N],
    connections: &[Connection<N::Id>],
    external: &[N::Id],
) -> Vec<ConnectionIssue<N::Id>> {
    let by_id: HashMap<&N::Id, &N> = nodes.iter().map(|n| (n.id(), n)).collect();
    let external: HashSet<&N::Id> = external.iter().collect();
    let mut fed: HashSet<(&N::Id, &str)> = HashSet::new();
    let mut issues = Vec::new();

    for conn in connections {
        if !external.contains(&conn.source.node) {
            match by_id.get(&conn.source.node) {
                None => issues.push(ConnectionIssue::UnknownSourceNode {
                    connection: conn.clone(),
                }),
                Some(node) if !declares(node.output_ports(), &conn.source.port) => {
                    issues.push(ConnectionIssue::UndeclaredSourcePort {
                        connection: conn.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        match by_id.get(&conn.target.node) {
            None => issues.push(ConnectionIssue::UnknownTargetNode {
                connection: conn.clone(),
            }),
            Some(node) if !declares(node.input_ports(), &conn.target.port) => {
                issues.push(ConnectionIssue::UndeclaredTargetPort {
                    connection: conn.clone(),
                })
            }
            Some(_) => {}
        }

        if !fed.insert((&conn.target.node, conn.target.port.as_str())) {
            issues.push(ConnectionIssue::ConflictingTarget {
                connection: conn.clone(),
            });
        }
    }

    issues
}

fn declares(ports: &[String], port: &str) -> bool {
    ports.iter().any(|p| p == port)
}

/// Convenience for hosts that only care whether the wiring is clean.
pub fn is_well_formed<N: GraphNode>(nodes: &[N], connections: &[Connection<N::Id>]) -> bool {
    validate_connections(nodes, connections, &[]).is_empty()
}
