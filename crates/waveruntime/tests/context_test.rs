// crates/waveruntime/tests/context_test.rs

use std::sync::Arc;
use std::time::Duration;

use wavecore::{NodeContract, NodeError, Value};
use waveruntime::{
    ExecutorConfig, FailurePolicy, MissingInputPolicy, NodeContext, NodeExecutor, NodeOutputs,
};

#[test]
fn test_absent_and_empty_inputs_both_read_as_none() {
    let node = Arc::new(NodeContract::new("n", "test").with_inputs(["a", "b"]));
    let ctx: NodeContext<_, Value> = NodeContext::new(node)
        .with_input("a", None)
        .with_input("c", Some(Value::from(1i64)));

    assert!(ctx.input("a").is_none());
    assert!(ctx.input("b").is_none());
    assert_eq!(ctx.require_input("c").unwrap(), &Value::from(1i64));
    assert_eq!(
        ctx.require_input("a").unwrap_err(),
        NodeError::MissingInput("a".into())
    );
}

#[test]
fn test_take_input_moves_the_value_out() {
    let node = Arc::new(NodeContract::new("n", "test").with_input("a"));
    let mut ctx: NodeContext<_, Value> =
        NodeContext::new(node).with_input("a", Some(Value::from("once")));

    assert_eq!(ctx.take_input("a"), Some(Value::from("once")));
    assert_eq!(ctx.take_input("a"), None);
    assert_eq!(ctx.node_id(), &"n");
}

#[tokio::test]
async fn test_closures_are_executors() {
    let executor = |ctx: NodeContext<NodeContract<&'static str>, i32>| async move {
        let x = *ctx.require_input("x")?;
        Ok::<_, NodeError>(NodeOutputs::from([("y".to_string(), x * 2)]))
    };

    let node = Arc::new(NodeContract::new("double", "math"));
    let outputs = executor
        .execute(NodeContext::new(node).with_input("x", Some(21)))
        .await
        .unwrap();

    assert_eq!(outputs["y"], 42);
}

#[test]
fn test_check_cancelled_reports_after_cancel() {
    let node = Arc::new(NodeContract::new("n", "test"));
    let ctx: NodeContext<_, ()> = NodeContext::new(node);
    assert!(ctx.check_cancelled().is_ok());
    ctx.cancellation.cancel();
    assert!(ctx.is_cancelled());
    assert_eq!(ctx.check_cancelled(), Err(NodeError::Cancelled));
}

#[test]
fn test_partial_config_falls_back_to_defaults() {
    let config: ExecutorConfig =
        serde_json::from_str(r#"{"missing_input": "strict", "node_timeout_ms": 2500}"#).unwrap();

    assert_eq!(config.missing_input, MissingInputPolicy::Strict);
    assert_eq!(config.on_node_failure, FailurePolicy::CancelSiblings);
    assert_eq!(config.node_timeout(), Some(Duration::from_millis(2500)));
    assert_eq!(config.event_buffer_size, 1000);
}

#[test]
fn test_config_builders() {
    let config = ExecutorConfig::default()
        .with_failure_policy(FailurePolicy::DrainSiblings)
        .with_node_timeout(Duration::from_secs(3));

    assert_eq!(config.on_node_failure, FailurePolicy::DrainSiblings);
    assert_eq!(config.node_timeout_ms, Some(3000));
    assert_eq!(config.missing_input, MissingInputPolicy::Lenient);
}
