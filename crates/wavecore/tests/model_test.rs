// crates/wavecore/tests/model_test.rs

use chrono::Utc;
use uuid::Uuid;
use wavecore::{
    Connection, Endpoint, EventBus, EventEmitter, ExecutionEvent, GraphError, GraphNode,
    NodeContract, NodeError, NodeEvent, Value, WiringError,
};

#[test]
fn test_json_conversion_keeps_structure() {
    let json = serde_json::json!({"name": "rune", "tags": ["a", "b"], "weight": 2.5, "on": true});
    let value = Value::from(json.clone());

    let map = value.as_map().expect("object becomes a map");
    assert_eq!(map["name"].as_str(), Some("rune"));
    assert_eq!(map["tags"].as_list().map(|l| l.len()), Some(2));
    assert_eq!(map["weight"].as_f64(), Some(2.5));
    assert_eq!(map["on"].as_bool(), Some(true));

    assert_eq!(serde_json::Value::from(value), json);
}

#[test]
fn test_value_clones_do_not_share_composite_contents() {
    let original = Value::List(vec![Value::from(1i64)]);
    let mut copy = original.clone();
    copy.as_list_mut().unwrap().push(Value::from(2i64));

    assert_eq!(original.as_list().unwrap().len(), 1);
    assert_eq!(copy.as_list().unwrap().len(), 2);
    assert!(copy.is_composite());
    assert_eq!(Value::from(None::<bool>).type_name(), "null");
}

#[test]
fn test_builder_ignores_duplicate_ports() {
    let node = NodeContract::new("update", "script")
        .with_label("Update mood")
        .with_inputs(["a", "b", "a"])
        .with_output("a")
        .with_output("a")
        .with_config("language", "lua");

    assert_eq!(node.input_ports(), ["a".to_string(), "b".to_string()]);
    assert_eq!(node.output_ports(), ["a".to_string()]);
    assert_eq!(node.label.as_deref(), Some("Update mood"));
    assert_eq!(node.config_value("language"), Some(&Value::from("lua")));
    assert!(node.passes_through("a"));
    assert!(!node.passes_through("b"));
}

#[test]
fn test_contract_deserializes_with_defaults() {
    let node: NodeContract<String> = serde_json::from_str(
        r#"{"id": "regex-1", "kind": "regex", "outputs": ["match"]}"#,
    )
    .unwrap();

    assert_eq!(node.id, "regex-1");
    assert!(node.inputs.is_empty());
    assert_eq!(node.outputs, vec!["match".to_string()]);
    assert!(node.label.is_none());
}

#[test]
fn test_labelled_contract_round_trips_through_json() {
    let node = NodeContract::new("fmt".to_string(), "template").with_label("Format prompt");

    let json = serde_json::to_string(&node).unwrap();
    let back: NodeContract<String> = serde_json::from_str(&json).unwrap();

    assert_eq!(back, node);
}

#[test]
fn test_connection_display() {
    let conn = Connection::between("a", "x", "b", "y");
    assert_eq!(conn.to_string(), "a.x -> b.y");
    assert_eq!(conn.source, Endpoint::new("a", "x"));
}

#[test]
fn test_error_helpers() {
    let wiring = WiringError::MissingSource {
        node: "print".into(),
        port: "text".into(),
    };
    assert_eq!(wiring.node(), "print");
    assert_eq!(wiring.port(), "text");

    let err = GraphError::from(wiring);
    assert_eq!(err.node(), Some("print"));
    assert!(!err.is_cancelled());

    let failed = GraphError::NodeExecution {
        node: "llm".into(),
        source: NodeError::Timeout { millis: 50 },
    };
    assert_eq!(failed.node(), Some("llm"));
    assert!(GraphError::Cancelled.is_cancelled());
}

#[tokio::test]
async fn test_emitter_tags_events_with_node_and_execution() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let execution_id = Uuid::new_v4();

    bus.create_emitter(execution_id, "rune-7").info("halfway");

    match rx.recv().await.unwrap() {
        ExecutionEvent::NodeEvent {
            execution_id: id,
            node_id,
            event: NodeEvent::Info { message },
            ..
        } => {
            assert_eq!(id, execution_id);
            assert_eq!(node_id, "rune-7");
            assert_eq!(message, "halfway");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_emitting_without_subscribers_is_harmless() {
    let bus = EventBus::new(4);
    bus.emit(ExecutionEvent::RunCompleted {
        execution_id: Uuid::new_v4(),
        success: true,
        duration_ms: 0,
        timestamp: Utc::now(),
    });
    EventEmitter::detached("x").warn("nobody listens");
}

#[test]
fn test_events_serialize_with_type_tag() {
    let event = ExecutionEvent::WaveStarted {
        execution_id: Uuid::nil(),
        wave: 2,
        nodes: vec!["a".into(), "b".into()],
        timestamp: Utc::now(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "WaveStarted");
    assert_eq!(json["wave"], 2);
}
