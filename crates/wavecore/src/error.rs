use thiserror::Error;

/// Top-level failure of one graph run.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Wiring error: {0}")]
    Wiring(#[from] WiringError),

    #[error("Graph cannot make progress, stuck nodes: {}", .stuck.join(", "))]
    Structural {
        /// Every node that had not completed when the frontier ran dry.
        stuck: Vec<String>,
        /// Strongly connected components among the stuck nodes, when any.
        cycles: Vec<Vec<String>>,
    },

    #[error("Node '{node}' failed: {source}")]
    NodeExecution {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("No value for input port '{port}' on node '{node}'")]
    MissingInput { node: String, port: String },

    #[error("Task for node '{node}' did not finish: {message}")]
    TaskPanicked { node: String, message: String },
}

impl GraphError {
    /// The node this error is attributed to, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            GraphError::Wiring(e) => Some(e.node()),
            GraphError::NodeExecution { node, .. }
            | GraphError::MissingInput { node, .. }
            | GraphError::TaskPanicked { node, .. } => Some(node),
            GraphError::DuplicateNode(node) => Some(node),
            GraphError::Structural { .. } | GraphError::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GraphError::Cancelled)
    }
}

/// Auto-wiring could not infer a connection set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WiringError {
    #[error("no source for input port `{port}` on node `{node}`")]
    MissingSource { node: String, port: String },

    #[error("implicit overwrite of `{port}` by node `{node}`, previously produced by `{previous}`")]
    ImplicitOverwrite {
        node: String,
        port: String,
        previous: String,
    },
}

impl WiringError {
    pub fn node(&self) -> &str {
        match self {
            WiringError::MissingSource { node, .. } | WiringError::ImplicitOverwrite { node, .. } => {
                node
            }
        }
    }

    pub fn port(&self) -> &str {
        match self {
            WiringError::MissingSource { port, .. } | WiringError::ImplicitOverwrite { port, .. } => {
                port
            }
        }
    }
}

/// Failure reported by a node's own execution logic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("No handler registered for node kind '{0}'")]
    UnknownKind(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Cancelled")]
    Cancelled,
}
