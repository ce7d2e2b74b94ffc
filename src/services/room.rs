//! Connection Registry — room membership, hydration, and fan-out.
//!
//! DESIGN
//! ======
//! A room is the set of live sessions viewing one board. Board state is
//! hydrated from the store on first join and kept in memory while any
//! session is connected or a flush is outstanding.
//!
//! ERROR HANDLING
//! ==============
//! On last-session part the state is evicted only when nothing is waiting to
//! be persisted. A pending debounce timer or unflushed dirty flags keep the
//! board in memory so the write (or the retry sweep) can complete; rejoin
//! hydration is skipped in that window so unflushed edits are never
//! clobbered by a stale store snapshot.

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::protocol::Fact;
use crate::services::auth::VerifiedUser;
use crate::shape::Shape;
use crate::state::{AppState, BoardState, ConnectedClient};
use crate::store::StoreError;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("board not found: {0}")]
    NotFound(Uuid),
    #[error("board {0} is not owned by the caller")]
    Forbidden(Uuid),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Snapshot handed to a session that just joined.
#[derive(Debug, Clone)]
pub struct JoinedRoom {
    pub name: String,
    pub shapes: Vec<Shape>,
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join a board's room. Hydrates from the store if this is the first live
/// session and no unflushed local state exists. Idempotent per session:
/// re-joining replaces the registered sender.
///
/// # Errors
///
/// `NotFound` when the board does not exist, `Forbidden` when the verified
/// subject does not own it, or a store error from hydration.
pub async fn join_room(
    state: &AppState,
    board_id: Uuid,
    user: &VerifiedUser,
    session_id: Uuid,
    color: &str,
    tx: mpsc::Sender<Fact>,
) -> Result<JoinedRoom, RoomError> {
    // Fetch the record outside the lock; it is only applied when hydrating.
    let record = state.store.get(board_id).await?.ok_or(RoomError::NotFound(board_id))?;
    if record.owner_id != user.id {
        return Err(RoomError::Forbidden(board_id));
    }

    let mut boards = state.boards.write().await;
    let board = boards
        .entry(board_id)
        .or_insert_with(|| BoardState::new(record.name.clone()));

    // First live session hydrates — unless local state is newer than the
    // store (dirty or mid-flush), which happens when the room emptied before
    // its debounced write landed.
    if board.clients.is_empty() && !board.dirty() && board.pending_flush.is_none() {
        board.shapes = record.shapes;
        board.name = record.name;
        info!(%board_id, count = board.shapes.len(), "hydrated board from store");
    }

    board.clients.insert(session_id, tx);
    board.users.insert(
        session_id,
        ConnectedClient { user_id: user.id, display_name: user.name.clone(), color: color.to_owned() },
    );

    info!(%board_id, %session_id, sessions = board.clients.len(), "session joined room");
    Ok(JoinedRoom { name: board.name.clone(), shapes: board.shapes.clone() })
}

/// Leave a room. Evicts the board state when the room empties and nothing is
/// awaiting persistence.
pub async fn part_room(state: &AppState, board_id: Uuid, session_id: Uuid) {
    let mut boards = state.boards.write().await;
    let Some(board) = boards.get_mut(&board_id) else {
        return;
    };

    board.clients.remove(&session_id);
    board.users.remove(&session_id);
    info!(%board_id, %session_id, remaining = board.clients.len(), "session left room");

    if board.clients.is_empty() {
        if board.pending_flush.is_some() {
            // The debounce task evicts after it writes.
            info!(%board_id, "eviction deferred until pending flush completes");
        } else if board.dirty() {
            // A previous flush failed; the retry sweep owns this board now.
            tracing::warn!(%board_id, "room empty with unflushed state; retained for retry");
        } else {
            boards.remove(&board_id);
            info!(%board_id, "evicted board from memory");
        }
    }
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Deliver a fact to every session in a room, optionally excluding one.
///
/// Engine mutations fan out synchronously under the write guard instead (see
/// [`BoardState::fanout`]); this wrapper serves the paths that hold no lock,
/// such as presence and REST-triggered notifications.
pub async fn broadcast(state: &AppState, board_id: Uuid, fact: &Fact, exclude: Option<Uuid>) {
    let boards = state.boards.read().await;
    let Some(board) = boards.get(&board_id) else {
        return;
    };
    board.fanout(fact, exclude);
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
