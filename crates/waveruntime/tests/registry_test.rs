// crates/waveruntime/tests/registry_test.rs

use std::sync::Arc;

use async_trait::async_trait;
use wavecore::{ExecutionEvent, GraphError, NodeContract, NodeError, NodeEvent, Value};
use waveruntime::{
    CancellationToken, ExecutionRequest, GraphExecutor, InputNode, NodeContext, NodeExecutor,
    NodeHandler, NodeOutputs, NodeRegistry,
};

type Contract = NodeContract<String>;

struct Upper;

#[async_trait]
impl NodeHandler<String, Value> for Upper {
    fn kind(&self) -> &str {
        "text.upper"
    }

    async fn execute(
        &self,
        ctx: NodeContext<Contract, Value>,
    ) -> Result<NodeOutputs<Value>, NodeError> {
        let text = ctx.require_input("text")?;
        let text = text.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: "text".into(),
            expected: "string".into(),
            actual: text.type_name().into(),
        })?;
        ctx.events.info(format!("upper-casing {} chars", text.len()));
        Ok(NodeOutputs::from([("text".to_string(), Value::from(text.to_uppercase()))]))
    }
}

struct Join;

#[async_trait]
impl NodeHandler<String, Value> for Join {
    fn kind(&self) -> &str {
        "text.join"
    }

    async fn execute(
        &self,
        ctx: NodeContext<Contract, Value>,
    ) -> Result<NodeOutputs<Value>, NodeError> {
        let separator = ctx
            .node
            .config_value("separator")
            .and_then(Value::as_str)
            .unwrap_or(" ")
            .to_string();
        let parts: Vec<&str> = ctx
            .node
            .inputs
            .iter()
            .filter_map(|port| ctx.input(port).and_then(Value::as_str))
            .collect();
        Ok(NodeOutputs::from([(
            "joined".to_string(),
            Value::from(parts.join(separator.as_str())),
        )]))
    }

    fn validate(&self, node: &Contract) -> Result<(), NodeError> {
        if node.outputs.iter().any(|p| p == "joined") {
            Ok(())
        } else {
            Err(NodeError::Configuration("join nodes must declare `joined`".into()))
        }
    }
}

fn registry() -> NodeRegistry<String, Value> {
    let mut registry = NodeRegistry::new();
    registry.register(Arc::new(Upper));
    registry.register(Arc::new(Join));
    registry
}

fn contracts() -> Vec<Contract> {
    vec![
        NodeContract::new("shout".to_string(), "text.upper")
            .with_input("text")
            .with_output("text"),
        NodeContract::new("join".to_string(), "text.join")
            .with_inputs(["text", "name"])
            .with_output("joined")
            .with_config("separator", ", "),
    ]
}

#[tokio::test]
async fn test_registry_runs_auto_wired_graph() {
    let registry = registry();
    registry.validate(&contracts()).expect("contracts are valid");

    let request = ExecutionRequest::new(contracts()).with_input_node(InputNode::new(
        "@input".to_string(),
        [
            ("text".to_string(), Value::from("hello")),
            ("name".to_string(), Value::from("world")),
        ],
    ));

    let executor = GraphExecutor::new();
    let mut events = executor.subscribe_events();
    let outcome = executor
        .execute(request, Arc::new(registry), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome.get(&"join".to_string(), "joined"),
        Some(Value::from("HELLO, world"))
    );

    let mut infos = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ExecutionEvent::NodeEvent {
            node_id,
            event: NodeEvent::Info { message },
            ..
        } = event
        {
            infos.push((node_id, message));
        }
    }
    assert_eq!(infos, vec![("shout".to_string(), "upper-casing 5 chars".to_string())]);
}

#[tokio::test]
async fn test_registry_validation_names_the_offending_node() {
    let registry = registry();
    let mut nodes = contracts();
    nodes.push(NodeContract::new("broken-join".to_string(), "text.join").with_input("text"));
    nodes.push(NodeContract::new("mystery".to_string(), "text.reverse"));

    let (node, error) = registry.validate(&nodes).unwrap_err();
    assert_eq!(node, "broken-join");
    assert!(matches!(error, NodeError::Configuration(_)));
}

#[tokio::test]
async fn test_unknown_kind_fails_the_run() {
    let request = ExecutionRequest::new(vec![NodeContract::new(
        "mystery".to_string(),
        "text.reverse",
    )]);

    let err = GraphExecutor::new()
        .execute(request, Arc::new(registry()), CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        GraphError::NodeExecution { node, source } => {
            assert_eq!(node, "mystery");
            assert_eq!(source, NodeError::UnknownKind("text.reverse".into()));
        }
        other => panic!("expected node failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_type_mismatch_is_reported_by_the_handler() {
    let request = ExecutionRequest::new(vec![NodeContract::new("shout".to_string(), "text.upper")
        .with_input("text")
        .with_output("text")])
    .with_input_node(InputNode::new(
        "@input".to_string(),
        [("text".to_string(), Value::from(42i64))],
    ));

    let err = GraphExecutor::new()
        .execute(request, Arc::new(registry()), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GraphError::NodeExecution {
            source: NodeError::InvalidInputType { ref actual, .. },
            ..
        } if actual == "number"
    ));
}

#[tokio::test]
async fn test_registry_dispatches_directly_on_kind() {
    let node = Arc::new(
        NodeContract::new("join".to_string(), "text.join")
            .with_inputs(["a", "b"])
            .with_output("joined")
            .with_config("separator", "-"),
    );
    let ctx = NodeContext::new(node)
        .with_input("a", Some(Value::from("x")))
        .with_input("b", Some(Value::from("y")));

    let outputs = registry().execute(ctx).await.unwrap();

    assert_eq!(outputs["joined"], Value::from("x-y"));
}

#[test]
fn test_registry_lists_kinds_and_default_metadata() {
    let mut registry = registry();
    assert_eq!(registry.kinds(), vec!["text.join".to_string(), "text.upper".to_string()]);
    assert!(registry.contains("text.upper"));
    assert!(registry.metadata("text.reverse").is_none());
    assert_eq!(
        registry.metadata("text.join").map(|m| m.category),
        Some("general".to_string())
    );

    registry.register(Arc::new(Upper));
    assert_eq!(registry.kinds().len(), 2, "re-registering replaces the handler");
}
