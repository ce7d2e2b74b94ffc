use super::*;
use crate::services::auth::VerifiedUser;
use crate::state::test_helpers;

fn auth(user: &VerifiedUser) -> AuthUser {
    AuthUser { user: user.clone() }
}

#[test]
fn name_validation_trims_and_bounds() {
    assert_eq!(validate_name("  Roadmap  ").unwrap(), "Roadmap");
    assert!(validate_name("   ").is_err());
    assert!(validate_name(&"x".repeat(MAX_BOARD_NAME_LEN + 1)).is_err());
    assert!(validate_name(&"x".repeat(MAX_BOARD_NAME_LEN)).is_ok());
}

#[test]
fn description_validation_bounds_length() {
    assert_eq!(validate_description(None).unwrap(), None);
    assert_eq!(validate_description(Some("fine")).unwrap().as_deref(), Some("fine"));
    assert!(validate_description(Some(&"d".repeat(501))).is_err());
}

#[tokio::test]
async fn create_board_persists_and_returns_record() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();

    let body = CreateBoardBody { name: "  Sprint Wall ".into(), description: Some("weekly sync".into()) };
    let (status, Json(response)) = create_board(State(state), auth(&user), Json(body)).await.unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.name, "Sprint Wall");
    assert_eq!(response.owner_id, user.id);
    assert!(store.records.lock().unwrap().contains_key(&response.id));
}

#[tokio::test]
async fn create_board_rejects_blank_name() {
    let (state, _store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();

    let body = CreateBoardBody { name: "   ".into(), description: None };
    let result = create_board(State(state), auth(&user), Json(body)).await;
    assert!(matches!(result, Err(StatusCode::UNPROCESSABLE_ENTITY)));
}

#[tokio::test]
async fn get_board_hides_foreign_boards() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = Uuid::new_v4();
    store.insert_record(test_helpers::board_record(board_id, Uuid::new_v4(), "Not Yours"));

    let result = get_board(State(state), auth(&user), Path(board_id)).await;
    assert!(matches!(result, Err(StatusCode::NOT_FOUND)));
}

#[tokio::test]
async fn list_boards_scopes_to_owner() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    store.insert_record(test_helpers::board_record(Uuid::new_v4(), user.id, "Mine"));
    store.insert_record(test_helpers::board_record(Uuid::new_v4(), Uuid::new_v4(), "Theirs"));

    let Json(rows) = list_boards(State(state), auth(&user)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Mine");
}

#[tokio::test]
async fn rename_updates_live_room_and_broadcasts() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = Uuid::new_v4();
    store.insert_record(test_helpers::board_record(board_id, user.id, "Old Name"));
    {
        let mut boards = state.boards.write().await;
        boards.insert(board_id, crate::state::BoardState::new("Old Name".into()));
    }
    let mut peer_rx = test_helpers::attach_client(&state, board_id, Uuid::new_v4()).await;

    let body = UpdateBoardBody { name: Some("New Name".into()), description: None };
    let Json(response) = update_board(State(state.clone()), auth(&user), Path(board_id), Json(body))
        .await
        .unwrap();

    assert_eq!(response.name, "New Name");
    let boards = state.boards.read().await;
    assert_eq!(boards.get(&board_id).unwrap().name, "New Name");
    assert!(matches!(peer_rx.try_recv(), Ok(Fact::BoardRenamed { name }) if name == "New Name"));
}

#[tokio::test]
async fn delete_board_evicts_room_and_notifies_sessions() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = Uuid::new_v4();
    store.insert_record(test_helpers::board_record(board_id, user.id, "Doomed"));
    {
        let mut boards = state.boards.write().await;
        boards.insert(board_id, crate::state::BoardState::new("Doomed".into()));
    }
    let mut peer_rx = test_helpers::attach_client(&state, board_id, Uuid::new_v4()).await;

    delete_board(State(state.clone()), auth(&user), Path(board_id))
        .await
        .unwrap();

    assert!(!store.records.lock().unwrap().contains_key(&board_id));
    let boards = state.boards.read().await;
    assert!(!boards.contains_key(&board_id));
    assert!(matches!(peer_rx.try_recv(), Ok(Fact::BoardDeleted)));
}

#[tokio::test]
async fn delete_foreign_board_is_not_found() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = Uuid::new_v4();
    store.insert_record(test_helpers::board_record(board_id, Uuid::new_v4(), "Not Yours"));

    let result = delete_board(State(state), auth(&user), Path(board_id)).await;
    assert!(matches!(result, Err(StatusCode::NOT_FOUND)));
}

#[tokio::test]
async fn list_shapes_prefers_live_state() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = Uuid::new_v4();
    store.insert_record(test_helpers::board_record(board_id, user.id, "Board"));
    {
        let mut boards = state.boards.write().await;
        let mut board = crate::state::BoardState::new("Board".into());
        board.shapes.push(test_helpers::sample_rect(Uuid::new_v4()));
        boards.insert(board_id, board);
    }

    let Json(shapes) = list_shapes(State(state), auth(&user), Path(board_id)).await.unwrap();
    assert_eq!(shapes.len(), 1, "live room state wins over the stale record");
}

#[tokio::test]
async fn overwrite_shapes_replaces_live_state_and_broadcasts() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = Uuid::new_v4();
    store.insert_record(test_helpers::board_record(board_id, user.id, "Board"));
    {
        let mut boards = state.boards.write().await;
        let mut board = crate::state::BoardState::new("Board".into());
        board.shapes.push(test_helpers::sample_rect(Uuid::new_v4()));
        boards.insert(board_id, board);
    }
    let mut peer_rx = test_helpers::attach_client(&state, board_id, Uuid::new_v4()).await;

    let replacement = vec![
        test_helpers::sample_arrow(Uuid::new_v4()),
        test_helpers::sample_freehand(Uuid::new_v4()),
    ];
    overwrite_shapes(State(state.clone()), auth(&user), Path(board_id), Json(replacement.clone()))
        .await
        .unwrap();

    let boards = state.boards.read().await;
    let board = boards.get(&board_id).unwrap();
    assert_eq!(board.shapes.len(), 2);
    assert!(!board.shapes_dirty);
    assert!(matches!(peer_rx.try_recv(), Ok(Fact::ShapesReplaced { shapes }) if shapes.len() == 2));

    let records = store.records.lock().unwrap();
    assert_eq!(records.get(&board_id).unwrap().shapes.len(), 2);
}

#[tokio::test]
async fn overwrite_shapes_rejects_invalid_payload() {
    let (state, store) = test_helpers::test_app_state();
    let user = test_helpers::test_user();
    let board_id = Uuid::new_v4();
    store.insert_record(test_helpers::board_record(board_id, user.id, "Board"));

    let mut bad = test_helpers::sample_rect(Uuid::new_v4());
    if let Shape::Rect(ref mut s) = bad {
        s.stroke_width = 0.0;
    }
    let result = overwrite_shapes(State(state), auth(&user), Path(board_id), Json(vec![bad])).await;
    assert!(matches!(result, Err(StatusCode::UNPROCESSABLE_ENTITY)));
}
