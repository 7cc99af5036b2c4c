//! Core abstractions for the graph engine
//!
//! Nodes, ports, connections, values, errors and execution events. Nothing in
//! here schedules anything; see `waveruntime` for the engine itself.

mod connection;
mod error;
pub mod events;
mod node;
mod value;

pub use connection::{Connection, Endpoint};
pub use error::{GraphError, NodeError, WiringError};
pub use events::*;
pub use node::{GraphNode, NodeContract, NodeKey};
pub use value::Value;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
