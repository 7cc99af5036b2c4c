//! Graph execution runtime
//!
//! Wires nodes by port name, builds the dependency graph and runs it wave by
//! wave on tokio, publishing every output into a shared data store.

mod autowire;
mod config;
mod context;
mod executor;
mod graph;
mod registry;
mod request;
mod store;
mod validation;

pub use autowire::try_auto_connect;
pub use config::{ExecutorConfig, FailurePolicy, MissingInputPolicy};
pub use context::{NodeContext, NodeExecutor, NodeInputs, NodeOutputs};
pub use executor::{ExecutionOutcome, GraphExecutor};
pub use graph::DependencyGraph;
pub use registry::{HandlerMetadata, NodeHandler, NodeRegistry, PortDefinition};
pub use request::{ExecutionRequest, InputNode, OutputPostProcess, Wiring};
pub use store::DataStore;
pub use validation::{is_well_formed, validate_connections, ConnectionIssue};

pub use tokio_util::sync::CancellationToken;
