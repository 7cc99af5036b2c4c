//! Dependency graph built from nodes and connections.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use wavecore::{Connection, Endpoint, GraphError, GraphNode};

/// One wired input of a node: which port it feeds and where the value comes from.
#[derive(Debug, Clone)]
pub(crate) struct Inbound<K> {
    pub port: String,
    pub source: Endpoint<K>,
}

/// Nodes plus dependency/dependent adjacency for one run.
///
/// Edges point from producer to consumer. Several connections between the
/// same pair of nodes collapse into a single edge, so every dependency is
/// counted once. Connections whose source is not one of the nodes are kept
/// as inputs but add no edge: their values are expected to be in the store
/// already, typically from initial data.
pub struct DependencyGraph<N: GraphNode> {
    graph: DiGraph<Arc<N>, ()>,
    index: HashMap<N::Id, NodeIndex>,
    inbound: Vec<Vec<Inbound<N::Id>>>,
}

impl<N: GraphNode> DependencyGraph<N> {
    /// Wrap every node once and link them along `connections`.
    pub fn build<I>(nodes: I, connections: &[Connection<N::Id>]) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = Arc<N>>,
    {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for node in nodes {
            let id = node.id().clone();
            if index.contains_key(&id) {
                return Err(GraphError::DuplicateNode(id.to_string()));
            }
            index.insert(id, graph.add_node(node));
        }

        let mut inbound = vec![Vec::new(); graph.node_count()];
        for conn in connections {
            let Some(&to_idx) = index.get(&conn.target.node) else {
                tracing::warn!("Ignoring connection {}: target node is not part of this run", conn);
                continue;
            };

            match index.get(&conn.source.node) {
                Some(&from_idx) => {
                    graph.update_edge(from_idx, to_idx, ());
                }
                None => {
                    tracing::debug!("Connection {} reads an external endpoint", conn);
                }
            }

            inbound[to_idx.index()].push(Inbound {
                port: conn.target.port.clone(),
                source: conn.source.clone(),
            });
        }

        Ok(Self {
            graph,
            index,
            inbound,
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of distinct producer→consumer edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &N::Id) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &N::Id) -> Option<&Arc<N>> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    /// IDs of the nodes `id` waits for.
    pub fn dependencies(&self, id: &N::Id) -> Vec<N::Id> {
        self.neighbors(id, Direction::Incoming)
    }

    /// IDs of the nodes waiting for `id`.
    pub fn dependents(&self, id: &N::Id) -> Vec<N::Id> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Execution plan as successive waves, without running anything.
    ///
    /// Fails the same way a run would when the frontier runs dry.
    pub fn waves(&self) -> Result<Vec<Vec<N::Id>>, GraphError> {
        let mut pending = self.pending_counts();
        let mut frontier = self.roots();
        let mut completed = HashSet::with_capacity(self.len());
        let mut waves = Vec::new();

        while completed.len() < self.len() {
            if frontier.is_empty() {
                return Err(self.stuck_error(&completed));
            }
            let batch = std::mem::take(&mut frontier);
            for &idx in &batch {
                completed.insert(idx);
                frontier.extend(self.release_dependents(idx, &mut pending));
            }
            waves.push(batch.iter().map(|&idx| self.graph[idx].id().clone()).collect());
        }

        Ok(waves)
    }

    /// One valid sequential order, or a structural error if the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<N::Id>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order.into_iter().map(|idx| self.graph[idx].id().clone()).collect()),
            Err(_) => Err(self.stuck_error(&HashSet::new())),
        }
    }

    pub(crate) fn node_at(&self, idx: NodeIndex) -> &Arc<N> {
        &self.graph[idx]
    }

    pub(crate) fn inbound(&self, idx: NodeIndex) -> &[Inbound<N::Id>] {
        &self.inbound[idx.index()]
    }

    /// Nodes with no dependencies, in insertion order.
    pub(crate) fn roots(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// Outstanding dependency count per node, indexed by `NodeIndex::index()`.
    pub(crate) fn pending_counts(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect()
    }

    /// Mark `idx` complete in `pending` and return the dependents that became ready.
    pub(crate) fn release_dependents(&self, idx: NodeIndex, pending: &mut [usize]) -> Vec<NodeIndex> {
        let mut ready = Vec::new();
        for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
            let count = &mut pending[dependent.index()];
            *count = count.saturating_sub(1);
            if *count == 0 {
                ready.push(dependent);
            }
        }
        ready
    }

    /// Structural error naming every node not in `completed`.
    pub(crate) fn stuck_error(&self, completed: &HashSet<NodeIndex>) -> GraphError {
        let mut stuck: Vec<String> = self
            .graph
            .node_indices()
            .filter(|idx| !completed.contains(idx))
            .map(|idx| self.graph[idx].id().to_string())
            .collect();
        stuck.sort();

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.contains_edge(component[0], component[0])
            })
            .filter(|component| component.iter().all(|idx| !completed.contains(idx)))
            .map(|component| {
                let mut ids: Vec<String> = component
                    .into_iter()
                    .map(|idx| self.graph[idx].id().to_string())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();

        GraphError::Structural { stuck, cycles }
    }

    fn neighbors(&self, id: &N::Id, direction: Direction) -> Vec<N::Id> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<N::Id> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].id().clone())
            .collect();
        ids.sort();
        ids
    }
}
