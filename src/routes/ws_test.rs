use super::*;
use crate::shape::Shape;
use crate::state::test_helpers;
use serde_json::json;
use tokio::time::{Duration, timeout};

struct TestSession {
    session_id: Uuid,
    current_room: Option<Uuid>,
    tx: mpsc::Sender<Fact>,
    rx: mpsc::Receiver<Fact>,
}

impl TestSession {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel(32);
        Self { session_id: Uuid::new_v4(), current_room: None, tx, rx }
    }
}

async fn dispatch(state: &AppState, session: &mut TestSession, user: &VerifiedUser, text: &str) -> Vec<Fact> {
    dispatch_text(
        state,
        &mut session.current_room,
        session.session_id,
        user,
        "#5b9bd5",
        &session.tx,
        text,
    )
    .await
}

async fn recv_fact(rx: &mut mpsc::Receiver<Fact>) -> Fact {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("fact receive timed out")
        .expect("fact channel closed unexpectedly")
}

fn join_text(board_id: Uuid) -> String {
    json!({"event": "join-room", "board_id": board_id}).to_string()
}

fn create_rect_text(board_id: Uuid, shape_id: Uuid) -> String {
    json!({
        "event": "shape-create",
        "board_id": board_id,
        "shape": {
            "kind": "rect",
            "id": shape_id,
            "x": 10.0, "y": 10.0, "width": 50.0, "height": 50.0,
            "stroke": "#333333", "stroke_width": 2.0
        }
    })
    .to_string()
}

/// Board owned by `user`, present in the store, no live room yet.
fn seed_record(store: &test_helpers::RecordingStore, user: &VerifiedUser, name: &str) -> Uuid {
    let board_id = Uuid::new_v4();
    store.insert_record(test_helpers::board_record(board_id, user.id, name));
    board_id
}

#[tokio::test]
async fn join_replies_with_snapshot_and_notifies_peers() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = seed_record(&store, &user, "Roadmap");

    let mut a = TestSession::new();
    let replies = dispatch(&state, &mut a, &user, &join_text(board_id)).await;
    assert!(matches!(
        replies.as_slice(),
        [Fact::RoomJoined { name, shapes, .. }] if name == "Roadmap" && shapes.is_empty()
    ));
    assert_eq!(a.current_room, Some(board_id));

    let mut b = TestSession::new();
    let replies = dispatch(&state, &mut b, &user, &join_text(board_id)).await;
    assert!(matches!(replies.as_slice(), [Fact::RoomJoined { .. }]));

    // A hears about B; B does not hear about itself.
    let fact = recv_fact(&mut a.rx).await;
    assert!(matches!(fact, Fact::PresenceJoined { session_id, .. } if session_id == b.session_id));
    assert!(b.rx.try_recv().is_err());
}

#[tokio::test]
async fn join_unknown_board_answers_error() {
    let (state, _store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let mut a = TestSession::new();

    let replies = dispatch(&state, &mut a, &user, &join_text(Uuid::new_v4())).await;
    assert!(matches!(replies.as_slice(), [Fact::Error { .. }]));
    assert_eq!(a.current_room, None);
}

#[tokio::test]
async fn malformed_intent_is_dropped_without_reply_or_fact() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = seed_record(&store, &user, "Board");

    let mut a = TestSession::new();
    let mut b = TestSession::new();
    dispatch(&state, &mut a, &user, &join_text(board_id)).await;
    dispatch(&state, &mut b, &user, &join_text(board_id)).await;
    let _ = recv_fact(&mut a.rx).await; // presence-joined for B

    let truncated_shape = json!({
        "event": "shape-create",
        "board_id": board_id,
        "shape": {"kind": "rect", "id": Uuid::new_v4()}
    })
    .to_string();
    for bad in [
        "not json at all",
        r#"{"event": "shape-explode", "board_id": "not-a-uuid"}"#,
        truncated_shape.as_str(),
    ] {
        let replies = dispatch(&state, &mut a, &user, bad).await;
        assert!(replies.is_empty(), "malformed intent must not be answered");
    }

    assert!(b.rx.try_recv().is_err(), "malformed intent must never reach peers");
    let boards = state.boards.read().await;
    assert!(boards.get(&board_id).unwrap().shapes.is_empty());
}

#[tokio::test]
async fn mutation_before_join_is_dropped() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = seed_record(&store, &user, "Board");

    let mut a = TestSession::new();
    let replies = dispatch(&state, &mut a, &user, &create_rect_text(board_id, Uuid::new_v4())).await;
    assert!(replies.is_empty());

    let boards = state.boards.read().await;
    assert!(!boards.contains_key(&board_id), "no room state materializes");
}

#[tokio::test]
async fn mutation_addressed_to_other_board_is_dropped() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let joined = seed_record(&store, &user, "Joined");
    let other = seed_record(&store, &user, "Other");

    let mut a = TestSession::new();
    dispatch(&state, &mut a, &user, &join_text(joined)).await;

    let replies = dispatch(&state, &mut a, &user, &create_rect_text(other, Uuid::new_v4())).await;
    assert!(replies.is_empty());

    let boards = state.boards.read().await;
    assert!(boards.get(&joined).unwrap().shapes.is_empty());
    assert!(!boards.contains_key(&other));
}

#[tokio::test]
async fn switching_boards_parts_the_previous_room() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let first = seed_record(&store, &user, "First");
    let second = seed_record(&store, &user, "Second");

    let mut mover = TestSession::new();
    let mut watcher = TestSession::new();
    dispatch(&state, &mut watcher, &user, &join_text(first)).await;
    dispatch(&state, &mut mover, &user, &join_text(first)).await;
    let _ = recv_fact(&mut watcher.rx).await; // presence-joined

    dispatch(&state, &mut mover, &user, &join_text(second)).await;
    assert_eq!(mover.current_room, Some(second));

    let fact = recv_fact(&mut watcher.rx).await;
    assert!(matches!(fact, Fact::PresenceLeft { session_id } if session_id == mover.session_id));

    let boards = state.boards.read().await;
    assert!(!boards.get(&first).unwrap().clients.contains_key(&mover.session_id));
    assert!(boards.get(&second).unwrap().clients.contains_key(&mover.session_id));
}

/// The end-to-end convergence walk: create from A, update from B, delete
/// from A, then the debounced write leaves the store empty.
#[tokio::test(start_paused = true)]
async fn two_client_scenario_converges_and_flushes() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = seed_record(&store, &user, "Scenario");
    let shape_id = Uuid::new_v4();

    let mut a = TestSession::new();
    let mut b = TestSession::new();
    dispatch(&state, &mut a, &user, &join_text(board_id)).await;
    dispatch(&state, &mut b, &user, &join_text(board_id)).await;
    let _ = recv_fact(&mut a.rx).await; // presence-joined for B

    // A creates a rect; B receives the exact shape, A hears nothing.
    dispatch(&state, &mut a, &user, &create_rect_text(board_id, shape_id)).await;
    let Fact::ShapeCreated { shape } = recv_fact(&mut b.rx).await else {
        panic!("expected shape-created");
    };
    assert_eq!(shape.id(), shape_id);
    assert!(a.rx.try_recv().is_err());

    // B moves it; A receives the partial update and converges.
    let update = json!({
        "event": "shape-update",
        "board_id": board_id,
        "shape_id": shape_id,
        "props": {"x": 20.0}
    })
    .to_string();
    dispatch(&state, &mut b, &user, &update).await;
    let Fact::ShapeUpdated { shape_id: updated_id, props } = recv_fact(&mut a.rx).await else {
        panic!("expected shape-updated");
    };
    assert_eq!(updated_id, shape_id);
    assert_eq!(props.get("x").and_then(serde_json::Value::as_f64), Some(20.0));
    {
        let boards = state.boards.read().await;
        let Shape::Rect(s) = &boards.get(&board_id).unwrap().shapes[0] else {
            panic!("expected rect")
        };
        assert!((s.x - 20.0).abs() < f64::EPSILON);
        assert!((s.y - 10.0).abs() < f64::EPSILON);
        assert!((s.width - 50.0).abs() < f64::EPSILON);
        assert!((s.height - 50.0).abs() < f64::EPSILON);
    }

    // A deletes it; B's view no longer contains the shape.
    let delete = json!({
        "event": "shape-delete",
        "board_id": board_id,
        "shape_id": shape_id
    })
    .to_string();
    dispatch(&state, &mut a, &user, &delete).await;
    let fact = recv_fact(&mut b.rx).await;
    assert!(matches!(fact, Fact::ShapeDeleted { shape_id: id } if id == shape_id));

    // After the quiet period, one write landed and the record is empty.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let writes = store.shape_writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].1.is_empty());
    let records = store.records.lock().unwrap();
    assert!(records.get(&board_id).unwrap().shapes.is_empty());
}
