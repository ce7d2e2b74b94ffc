//! WebSocket handler — session loop and intent dispatch.
//!
//! DESIGN
//! ======
//! On upgrade the bearer token (query param) is verified, a session id is
//! generated, and the connection enters a `select!` loop:
//! - Incoming text → parse intent → dispatch to registry/engine
//! - Facts from room peers → forward to the socket
//!
//! The live channel is fire-and-forget: a malformed intent, or one addressed
//! to a room the session has not joined, is logged and dropped — no error
//! travels back, and nothing reaches peers. `join-room` is the exception and
//! answers with the board snapshot (or an error event), because the joiner
//! cannot render without it.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `session-connected` with `session_id`
//! 2. `join-room` → snapshot reply, `presence-joined` to peers
//! 3. Mutation intents → engine applies + fans out (echo-suppressed)
//! 4. Close → `presence-left` to peers → registry cleanup

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rand::seq::IndexedRandom;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{Fact, Intent};
use crate::services::auth::VerifiedUser;
use crate::services::{engine, room};
use crate::state::AppState;

/// Presence palette; each session gets one color for the lifetime of the
/// connection.
const PRESENCE_COLORS: &[&str] = &[
    "#5b9bd5", "#e6a23c", "#4ad981", "#d96a4a", "#9b6ad9", "#2ec4b6", "#d94a8c", "#8c9b3e",
];

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.get("token") else {
        return (StatusCode::UNAUTHORIZED, "token required").into_response();
    };

    let user = match state.verifier.verify(token).await {
        Ok(user) => user,
        Err(crate::services::auth::AuthError::Unauthorized) => {
            return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "ws token verification failed");
            return (StatusCode::BAD_GATEWAY, "verifier error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_session(socket, state, user))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_session(mut socket: WebSocket, state: AppState, user: VerifiedUser) {
    let session_id = Uuid::new_v4();
    let color = (*PRESENCE_COLORS
        .choose(&mut rand::rng())
        .unwrap_or(&PRESENCE_COLORS[0]))
    .to_owned();

    // Per-connection channel for facts fanned out by room peers.
    let (fact_tx, mut fact_rx) = mpsc::channel::<Fact>(256);

    let welcome = Fact::SessionConnected { session_id, display_name: user.name.clone() };
    if send_fact(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%session_id, user_id = %user.id, "ws: session connected");

    // The one room this session is in, if any. Reassigned atomically on
    // join; joining a new board parts the previous one first.
    let mut current_room: Option<Uuid> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies =
                            dispatch_text(&state, &mut current_room, session_id, &user, &color, &fact_tx, &text)
                                .await;
                        for fact in replies {
                            // A dead socket surfaces on the next recv.
                            let _ = send_fact(&mut socket, &fact).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(fact) = fact_rx.recv() => {
                if send_fact(&mut socket, &fact).await.is_err() {
                    break;
                }
            }
        }
    }

    // Presence-left goes out before cleanup; part_room may evict the state.
    if let Some(board_id) = current_room {
        room::broadcast(&state, board_id, &Fact::PresenceLeft { session_id }, Some(session_id)).await;
        room::part_room(&state, board_id, session_id).await;
    }
    info!(%session_id, "ws: session disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse one inbound text message and route it. Returns the facts owed to
/// the sender (snapshot replies and join errors; mutations return nothing).
///
/// Split from the socket loop so tests can drive dispatch through plain
/// channels without a live websocket.
pub(crate) async fn dispatch_text(
    state: &AppState,
    current_room: &mut Option<Uuid>,
    session_id: Uuid,
    user: &VerifiedUser,
    color: &str,
    fact_tx: &mpsc::Sender<Fact>,
    text: &str,
) -> Vec<Fact> {
    let intent = match Intent::parse(text) {
        Ok(intent) => intent,
        Err(e) => {
            // Malformed intents die here: no mutation, no fact, no reply.
            warn!(%session_id, error = %e, "ws: dropping malformed intent");
            return Vec::new();
        }
    };

    match intent {
        Intent::JoinRoom { board_id } => {
            join(state, current_room, session_id, user, color, fact_tx, board_id).await
        }
        Intent::ShapeCreate { board_id, shape } => {
            let Some(room_id) = addressed_room(*current_room, board_id, session_id, "shape-create") else {
                return Vec::new();
            };
            if let Err(e) = engine::create_shape(state, room_id, shape, session_id).await {
                warn!(%session_id, error = %e, "ws: shape-create dropped");
            }
            Vec::new()
        }
        Intent::ShapeUpdate { board_id, shape_id, props } => {
            let Some(room_id) = addressed_room(*current_room, board_id, session_id, "shape-update") else {
                return Vec::new();
            };
            if let Err(e) = engine::update_shape(state, room_id, shape_id, &props, session_id).await {
                warn!(%session_id, error = %e, "ws: shape-update dropped");
            }
            Vec::new()
        }
        Intent::ShapeDelete { board_id, shape_id } => {
            let Some(room_id) = addressed_room(*current_room, board_id, session_id, "shape-delete") else {
                return Vec::new();
            };
            if let Err(e) = engine::delete_shape(state, room_id, shape_id, session_id).await {
                warn!(%session_id, error = %e, "ws: shape-delete dropped");
            }
            Vec::new()
        }
        Intent::BoardRename { board_id, name } => {
            let Some(room_id) = addressed_room(*current_room, board_id, session_id, "board-rename") else {
                return Vec::new();
            };
            if let Err(e) = engine::rename_board(state, room_id, &name, session_id).await {
                warn!(%session_id, error = %e, "ws: board-rename dropped");
            }
            Vec::new()
        }
    }
}

async fn join(
    state: &AppState,
    current_room: &mut Option<Uuid>,
    session_id: Uuid,
    user: &VerifiedUser,
    color: &str,
    fact_tx: &mpsc::Sender<Fact>,
    board_id: Uuid,
) -> Vec<Fact> {
    // One room per session: switching boards parts the old room first.
    if let Some(old_board) = current_room.take() {
        if old_board != board_id {
            room::broadcast(state, old_board, &Fact::PresenceLeft { session_id }, Some(session_id)).await;
            room::part_room(state, old_board, session_id).await;
        }
    }

    match room::join_room(state, board_id, user, session_id, color, fact_tx.clone()).await {
        Ok(joined) => {
            *current_room = Some(board_id);
            let presence = Fact::PresenceJoined {
                session_id,
                display_name: user.name.clone(),
                color: color.to_owned(),
            };
            room::broadcast(state, board_id, &presence, Some(session_id)).await;
            vec![Fact::RoomJoined { board_id, name: joined.name, shapes: joined.shapes }]
        }
        Err(e) => {
            warn!(%session_id, %board_id, error = %e, "ws: join-room rejected");
            vec![Fact::Error { message: e.to_string() }]
        }
    }
}

/// Resolve the room an intent is addressed to. Intents sent before joining,
/// or addressed to a different board than the joined one, are dropped: the
/// registry only admits authorized sessions, and an addressed mismatch means
/// the client is confused or hostile.
fn addressed_room(current_room: Option<Uuid>, board_id: Uuid, session_id: Uuid, what: &str) -> Option<Uuid> {
    match current_room {
        Some(room_id) if room_id == board_id => Some(room_id),
        Some(_) | None => {
            warn!(%session_id, %board_id, intent = what, "ws: intent for unjoined board; dropping");
            None
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_fact(socket: &mut WebSocket, fact: &Fact) -> Result<(), ()> {
    let json = match serde_json::to_string(fact) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize fact");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
