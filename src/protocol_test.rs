use super::*;
use serde_json::json;

fn rect_value(id: Uuid) -> serde_json::Value {
    json!({
        "kind": "rect",
        "id": id,
        "x": 10.0, "y": 10.0, "width": 50.0, "height": 50.0,
        "stroke": "#333333", "stroke_width": 2.0
    })
}

#[test]
fn parses_every_intent_event() {
    let board_id = Uuid::new_v4();
    let shape_id = Uuid::new_v4();

    let join = json!({"event": "join-room", "board_id": board_id}).to_string();
    assert!(matches!(Intent::parse(&join), Ok(Intent::JoinRoom { .. })));

    let create = json!({
        "event": "shape-create",
        "board_id": board_id,
        "shape": rect_value(shape_id)
    })
    .to_string();
    assert!(matches!(Intent::parse(&create), Ok(Intent::ShapeCreate { .. })));

    let update = json!({
        "event": "shape-update",
        "board_id": board_id,
        "shape_id": shape_id,
        "props": {"x": 20.0}
    })
    .to_string();
    assert!(matches!(Intent::parse(&update), Ok(Intent::ShapeUpdate { .. })));

    let delete = json!({
        "event": "shape-delete",
        "board_id": board_id,
        "shape_id": shape_id
    })
    .to_string();
    assert!(matches!(Intent::parse(&delete), Ok(Intent::ShapeDelete { .. })));

    let rename = json!({
        "event": "board-rename",
        "board_id": board_id,
        "name": "Sprint Wall"
    })
    .to_string();
    assert!(matches!(Intent::parse(&rename), Ok(Intent::BoardRename { .. })));
}

#[test]
fn rejects_unknown_event() {
    let text = json!({"event": "shape-upsert", "board_id": Uuid::new_v4()}).to_string();
    assert!(matches!(Intent::parse(&text), Err(ProtocolError::Json(_))));
}

#[test]
fn rejects_missing_required_fields() {
    let text = json!({"event": "shape-create", "board_id": Uuid::new_v4()}).to_string();
    assert!(Intent::parse(&text).is_err());

    let text = json!({"event": "shape-update", "shape_id": Uuid::new_v4(), "props": {}}).to_string();
    assert!(Intent::parse(&text).is_err());
}

#[test]
fn rejects_invalid_shape_payload() {
    let mut shape = rect_value(Uuid::new_v4());
    shape["stroke_width"] = json!(0.0);
    let text = json!({
        "event": "shape-create",
        "board_id": Uuid::new_v4(),
        "shape": shape
    })
    .to_string();
    assert!(matches!(Intent::parse(&text), Err(ProtocolError::Shape(_))));
}

#[test]
fn rejects_ill_typed_update_props() {
    let text = json!({
        "event": "shape-update",
        "board_id": Uuid::new_v4(),
        "shape_id": Uuid::new_v4(),
        "props": {"x": "sideways"}
    })
    .to_string();
    assert!(matches!(Intent::parse(&text), Err(ProtocolError::Shape(_))));
}

#[test]
fn rejects_over_long_rename() {
    let text = json!({
        "event": "board-rename",
        "board_id": Uuid::new_v4(),
        "name": "x".repeat(MAX_BOARD_NAME_LEN + 1)
    })
    .to_string();
    assert!(matches!(Intent::parse(&text), Err(ProtocolError::NameTooLong)));
}

#[test]
fn rename_to_whitespace_is_parseable_and_collapses() {
    let text = json!({
        "event": "board-rename",
        "board_id": Uuid::new_v4(),
        "name": "   "
    })
    .to_string();
    let Ok(Intent::BoardRename { name, .. }) = Intent::parse(&text) else {
        panic!("expected rename intent");
    };
    assert_eq!(effective_board_name(&name), DEFAULT_BOARD_NAME);
    assert_eq!(effective_board_name("  Roadmap  "), "Roadmap");
}

#[test]
fn intent_reports_addressed_board() {
    let board_id = Uuid::new_v4();
    let intent = Intent::ShapeDelete { board_id, shape_id: Uuid::new_v4() };
    assert_eq!(intent.board_id(), board_id);
}

#[test]
fn facts_serialize_with_wire_names() {
    let fact = Fact::ShapeDeleted { shape_id: Uuid::new_v4() };
    let value = serde_json::to_value(&fact).unwrap();
    assert_eq!(value["event"], "shape-deleted");

    let fact = Fact::PresenceJoined {
        session_id: Uuid::new_v4(),
        display_name: "ada".into(),
        color: "#5b9bd5".into(),
    };
    let value = serde_json::to_value(&fact).unwrap();
    assert_eq!(value["event"], "presence-joined");

    let fact = Fact::BoardDeleted;
    let value = serde_json::to_value(&fact).unwrap();
    assert_eq!(value["event"], "board-deleted");

    let fact = Fact::BoardRenamed { name: "Renamed".into() };
    let value = serde_json::to_value(&fact).unwrap();
    assert_eq!(value["event"], "board-renamed");
}

#[test]
fn fact_round_trip_keeps_shape_payload() {
    let shape: crate::shape::Shape = serde_json::from_value(rect_value(Uuid::new_v4())).unwrap();
    let fact = Fact::ShapeCreated { shape: shape.clone() };
    let text = serde_json::to_string(&fact).unwrap();
    let restored: Fact = serde_json::from_str(&text).unwrap();
    let Fact::ShapeCreated { shape: restored_shape } = restored else {
        panic!("expected shape-created");
    };
    assert_eq!(restored_shape, shape);
}
