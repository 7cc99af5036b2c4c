use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when a connected source endpoint holds no value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingInputPolicy {
    /// Hand the node `None` and let it decide.
    #[default]
    Lenient,
    /// Fail the run before the node is invoked.
    Strict,
}

/// What happens to the rest of a batch once one of its nodes fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Trip the batch cancellation token and abort the remaining siblings.
    #[default]
    CancelSiblings,
    /// Let the remaining siblings finish, then discard their outputs.
    DrainSiblings,
}

/// Settings for a [`GraphExecutor`](crate::GraphExecutor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub missing_input: MissingInputPolicy,
    pub on_node_failure: FailurePolicy,
    /// Deadline for a single node, in milliseconds.
    pub node_timeout_ms: Option<u64>,
    pub event_buffer_size: usize,
}

impl ExecutorConfig {
    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_ms.map(Duration::from_millis)
    }

    pub fn strict(mut self) -> Self {
        self.missing_input = MissingInputPolicy::Strict;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_node_failure = policy;
        self
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            missing_input: MissingInputPolicy::Lenient,
            on_node_failure: FailurePolicy::CancelSiblings,
            node_timeout_ms: None,
            event_buffer_size: 1000,
        }
    }
}
