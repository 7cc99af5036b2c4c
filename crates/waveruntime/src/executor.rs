use crate::config::{ExecutorConfig, FailurePolicy, MissingInputPolicy};
use crate::context::{NodeContext, NodeExecutor, NodeInputs};
use crate::graph::DependencyGraph;
use crate::request::{ExecutionRequest, OutputPostProcess, RequestParts};
use crate::store::DataStore;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use petgraph::graph::NodeIndex;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use wavecore::{
    Connection, Endpoint, EventBus, ExecutionEvent, ExecutionId, GraphError, GraphNode, NodeError,
    NodeKey,
};

/// Executes dependency graphs wave by wave.
///
/// Each wave is the set of nodes whose dependencies have all published their
/// outputs. A wave runs concurrently on the tokio runtime and is awaited as a
/// whole before the next one is computed, so a node never starts before every
/// one of its dependencies has finished. The executor holds no state between
/// runs apart from its configuration and event bus.
pub struct GraphExecutor {
    config: ExecutorConfig,
    event_bus: Arc<EventBus>,
}

impl GraphExecutor {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self { config, event_bus }
    }

    /// Share an existing event bus instead of the executor's own.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Run every node of `request` in dependency order.
    ///
    /// Returns the final data store, or the first error: a wiring failure, a
    /// structural failure naming every node that could not run, the first
    /// node failure, or cancellation observed between waves. Nothing partial
    /// is ever returned as a success.
    pub async fn execute<N, V, E>(
        &self,
        request: ExecutionRequest<N, V>,
        executor: Arc<E>,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutcome<N::Id, V>, GraphError>
    where
        N: GraphNode + 'static,
        V: Clone + Send + Sync + 'static,
        E: NodeExecutor<N, V> + ?Sized + 'static,
    {
        let execution_id = ExecutionId::new_v4();
        let start_time = Instant::now();

        let connections = match request.resolve_connections() {
            Ok(connections) => connections,
            Err(e) => {
                tracing::error!("Wiring failed for execution {}: {}", execution_id, e);
                self.event_bus.emit(ExecutionEvent::RunCompleted {
                    execution_id,
                    success: false,
                    duration_ms: start_time.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }
        };

        self.event_bus.emit(ExecutionEvent::RunStarted {
            execution_id,
            node_count: request.nodes().len(),
            connection_count: connections.len(),
            timestamp: Utc::now(),
        });
        tracing::info!(
            "Starting graph execution {} ({} nodes, {} connections)",
            execution_id,
            request.nodes().len(),
            connections.len()
        );

        let run = Run {
            execution_id,
            config: &self.config,
            event_bus: &self.event_bus,
            cancel,
        };
        let result = run
            .execute(request.into_parts(), &connections, executor)
            .await;

        let duration = start_time.elapsed();
        self.event_bus.emit(ExecutionEvent::RunCompleted {
            execution_id,
            success: result.is_ok(),
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });

        match result {
            Ok((store, waves)) => {
                let completed_nodes = waves.iter().map(Vec::len).sum();
                tracing::info!(
                    "Graph execution {} completed in {}ms ({} waves)",
                    execution_id,
                    duration.as_millis(),
                    waves.len()
                );
                Ok(ExecutionOutcome {
                    execution_id,
                    store,
                    completed_nodes,
                    waves,
                    duration,
                })
            }
            Err(e) => {
                tracing::error!("Graph execution {} failed: {}", execution_id, e);
                Err(e)
            }
        }
    }
}

impl Default for GraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a successful run.
#[derive(Clone)]
pub struct ExecutionOutcome<K, V> {
    pub execution_id: ExecutionId,
    /// Initial data plus every output published during the run.
    pub store: DataStore<K, V>,
    pub completed_nodes: usize,
    /// Node IDs per wave, in the order the waves ran.
    pub waves: Vec<Vec<K>>,
    pub duration: Duration,
}

impl<K: NodeKey, V: Clone> ExecutionOutcome<K, V> {
    pub fn get(&self, node: &K, port: &str) -> Option<V> {
        self.store.get_port(node, port)
    }

    pub fn into_store(self) -> DataStore<K, V> {
        self.store
    }
}

impl<K: NodeKey, V> fmt::Debug for ExecutionOutcome<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOutcome")
            .field("execution_id", &self.execution_id)
            .field("store", &self.store)
            .field("completed_nodes", &self.completed_nodes)
            .field("waves", &self.waves)
            .field("duration", &self.duration)
            .finish()
    }
}

/// State borrowed for the duration of one `execute` call.
struct Run<'a> {
    execution_id: ExecutionId,
    config: &'a ExecutorConfig,
    event_bus: &'a EventBus,
    cancel: CancellationToken,
}

type Waves<K> = Vec<Vec<K>>;

impl Run<'_> {
    async fn execute<N, V, E>(
        &self,
        parts: RequestParts<N, V>,
        connections: &[Connection<N::Id>],
        executor: Arc<E>,
    ) -> Result<(DataStore<N::Id, V>, Waves<N::Id>), GraphError>
    where
        N: GraphNode + 'static,
        V: Clone + Send + Sync + 'static,
        E: NodeExecutor<N, V> + ?Sized + 'static,
    {
        let RequestParts {
            nodes,
            initial_data,
            post_process,
        } = parts;

        let graph = DependencyGraph::build(nodes, connections)?;
        let store = DataStore::with_initial(initial_data);

        let mut pending = graph.pending_counts();
        let mut frontier = graph.roots();
        let mut completed: HashSet<NodeIndex> = HashSet::with_capacity(graph.len());
        let mut waves = Vec::new();

        while completed.len() < graph.len() {
            if self.cancel.is_cancelled() {
                tracing::warn!("Execution {} cancelled before wave {}", self.execution_id, waves.len());
                return Err(GraphError::Cancelled);
            }

            if frontier.is_empty() {
                return Err(graph.stuck_error(&completed));
            }

            let batch = std::mem::take(&mut frontier);
            let wave = waves.len();
            let wave_ids: Vec<N::Id> = batch
                .iter()
                .map(|&idx| graph.node_at(idx).id().clone())
                .collect();

            self.event_bus.emit(ExecutionEvent::WaveStarted {
                execution_id: self.execution_id,
                wave,
                nodes: wave_ids.iter().map(ToString::to_string).collect(),
                timestamp: Utc::now(),
            });
            tracing::debug!("Wave {}: running {} node(s)", wave, batch.len());

            let finished = self
                .run_batch(&graph, &batch, wave, &store, &post_process, &executor)
                .await?;

            for idx in finished {
                completed.insert(idx);
                frontier.extend(graph.release_dependents(idx, &mut pending));
            }
            waves.push(wave_ids);
        }

        Ok((store, waves))
    }

    /// Run one wave to completion and return the nodes it finished.
    async fn run_batch<N, V, E>(
        &self,
        graph: &DependencyGraph<N>,
        batch: &[NodeIndex],
        wave: usize,
        store: &DataStore<N::Id, V>,
        post_process: &Option<OutputPostProcess<V>>,
        executor: &Arc<E>,
    ) -> Result<Vec<NodeIndex>, GraphError>
    where
        N: GraphNode + 'static,
        V: Clone + Send + Sync + 'static,
        E: NodeExecutor<N, V> + ?Sized + 'static,
    {
        // Inputs for the whole wave are assembled before anything is spawned,
        // so a strict-mode failure never leaves tasks behind.
        let mut prepared = Vec::with_capacity(batch.len());
        for &idx in batch {
            prepared.push((idx, self.collect_inputs(graph, idx, store, post_process)?));
        }

        let batch_token = self.cancel.child_token();
        let mut guard = AbortOnDrop(Vec::with_capacity(batch.len()));
        let mut running = FuturesUnordered::new();

        for (idx, inputs) in prepared {
            let node = Arc::clone(graph.node_at(idx));
            let node_id = node.id().to_string();

            self.event_bus.emit(ExecutionEvent::NodeStarted {
                execution_id: self.execution_id,
                node_id: node_id.clone(),
                wave,
                timestamp: Utc::now(),
            });

            let task = NodeTask {
                ctx: NodeContext {
                    node: Arc::clone(&node),
                    inputs,
                    cancellation: batch_token.clone(),
                    events: self.event_bus.create_emitter(self.execution_id, node_id.clone()),
                },
                node,
                executor: Arc::clone(executor),
                store: store.clone(),
                post_process: post_process.clone(),
                timeout: self.config.node_timeout(),
            };

            let handle = tokio::spawn(AssertUnwindSafe(task.run()).catch_unwind());
            guard.0.push(handle.abort_handle());
            running.push(async move { (idx, node_id, handle.await) });
        }

        let mut finished = Vec::with_capacity(batch.len());
        while let Some((idx, node_id, joined)) = running.next().await {
            let result = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(GraphError::TaskPanicked {
                    node: node_id.clone(),
                    message: panic_message(panic),
                }),
                Err(join_error) => Err(GraphError::TaskPanicked {
                    node: node_id.clone(),
                    message: join_error.to_string(),
                }),
            };

            match result {
                Ok(report) => {
                    tracing::debug!("Node {} completed in {}ms", node_id, report.duration_ms);
                    self.event_bus.emit(ExecutionEvent::NodeCompleted {
                        execution_id: self.execution_id,
                        node_id,
                        outputs: report.ports,
                        duration_ms: report.duration_ms,
                        timestamp: Utc::now(),
                    });
                    finished.push(idx);
                }
                Err(e) => {
                    tracing::error!("Node {} failed: {}", node_id, e);
                    self.event_bus.emit(ExecutionEvent::NodeFailed {
                        execution_id: self.execution_id,
                        node_id,
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });

                    match self.config.on_node_failure {
                        FailurePolicy::CancelSiblings => {
                            // Siblings still running are aborted when `guard` drops.
                            batch_token.cancel();
                        }
                        FailurePolicy::DrainSiblings => {
                            while running.next().await.is_some() {}
                        }
                    }

                    return Err(self.surface(e));
                }
            }
        }

        Ok(finished)
    }

    /// Gather the inputs of one node from the store.
    ///
    /// The post-process hook runs on every value read, so consumers of the
    /// same endpoint each get their own processed copy even when `V::clone`
    /// shares state.
    fn collect_inputs<N, V>(
        &self,
        graph: &DependencyGraph<N>,
        idx: NodeIndex,
        store: &DataStore<N::Id, V>,
        post_process: &Option<OutputPostProcess<V>>,
    ) -> Result<NodeInputs<V>, GraphError>
    where
        N: GraphNode,
        V: Clone,
    {
        let node = graph.node_at(idx);
        let mut inputs: NodeInputs<V> = HashMap::new();

        for inbound in graph.inbound(idx) {
            let value = store.get(&inbound.source).map(|value| match post_process {
                Some(hook) => hook(value),
                None => value,
            });
            if value.is_none() {
                if self.config.missing_input == MissingInputPolicy::Strict {
                    return Err(GraphError::MissingInput {
                        node: node.id().to_string(),
                        port: inbound.port.clone(),
                    });
                }
                tracing::debug!(
                    "No value at {} for {}.{}, passing none",
                    inbound.source,
                    node.id(),
                    inbound.port
                );
            }
            inputs.insert(inbound.port.clone(), value);
        }

        for port in node.input_ports() {
            inputs.entry(port.clone()).or_insert(None);
        }

        Ok(inputs)
    }

    /// A node that gave up because the run itself was cancelled reports as
    /// a cancelled run, not as a node failure.
    fn surface(&self, error: GraphError) -> GraphError {
        match error {
            GraphError::NodeExecution {
                source: NodeError::Cancelled,
                ..
            } if self.cancel.is_cancelled() => GraphError::Cancelled,
            other => other,
        }
    }
}

/// Bundled state for a single node execution task.
struct NodeTask<N: GraphNode, V, E: ?Sized> {
    ctx: NodeContext<N, V>,
    node: Arc<N>,
    executor: Arc<E>,
    store: DataStore<N::Id, V>,
    post_process: Option<OutputPostProcess<V>>,
    timeout: Option<Duration>,
}

struct NodeReport {
    ports: Vec<String>,
    duration_ms: u64,
}

impl<N, V, E> NodeTask<N, V, E>
where
    N: GraphNode + 'static,
    V: Clone + Send + Sync + 'static,
    E: NodeExecutor<N, V> + ?Sized + 'static,
{
    /// Execute the node and publish its outputs.
    ///
    /// Outputs are in the store before this returns, so by the time the
    /// scheduler marks the node complete its dependents can read them.
    async fn run(self) -> Result<NodeReport, GraphError> {
        let NodeTask {
            ctx,
            node,
            executor,
            store,
            post_process,
            timeout,
        } = self;

        let start = Instant::now();
        let execution = executor.execute(ctx);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout {
                    millis: limit.as_millis() as u64,
                }),
            },
            None => execution.await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let outputs = result.map_err(|source| GraphError::NodeExecution {
            node: node.id().to_string(),
            source,
        })?;

        let mut ports = Vec::with_capacity(outputs.len());
        for (port, value) in outputs {
            if !node.output_ports().contains(&port) {
                tracing::debug!("Node {} published undeclared port '{}'", node.id(), port);
            }
            let value = match &post_process {
                Some(hook) => hook(value),
                None => value,
            };
            store.publish(Endpoint::new(node.id().clone(), port.as_str()), value);
            ports.push(port);
        }
        ports.sort();

        Ok(NodeReport { ports, duration_ms })
    }
}

/// Aborts every task of a wave that is still running when dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "node task panicked".to_string()
    }
}
