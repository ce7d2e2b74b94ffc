//! Synchronization Engine — the authoritative state-transition function for
//! a board's shape list.
//!
//! DESIGN
//! ======
//! Each function applies one intent to the live record, fans the mirrored
//! fact out to every other session in the room, and arms the debounced
//! persistence writer. All three steps run under the room's write guard, so
//! a room's intents are applied strictly sequentially and facts leave in
//! apply order. Fan-out is non-blocking (`try_send`) and arming the writer
//! is fire-and-forget; nothing here awaits the store.
//!
//! CONFLICTS
//! =========
//! Field-level last-write-wins, defined by arrival order at the engine. No
//! version counters, no vector clocks, no stale-update rejection: two
//! sessions racing on the same field converge on whichever intent was
//! applied last. Callers get no stronger guarantee than that.

use tracing::info;
use uuid::Uuid;

use crate::protocol::{Fact, effective_board_name};
use crate::services::persistence;
use crate::shape::{Data, Shape};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The board has no live room — it was deleted or never joined. The
    /// intent is dropped; there is nobody to converge with.
    #[error("board not loaded: {0}")]
    BoardNotLoaded(Uuid),
}

// =============================================================================
// CREATE
// =============================================================================

/// Apply a `shape-create` intent: append the shape in paint order, or
/// replace in place when the id already exists (idempotent re-application).
///
/// # Errors
///
/// Returns `BoardNotLoaded` if the board has no live state.
pub async fn create_shape(
    state: &AppState,
    board_id: Uuid,
    mut shape: Shape,
    author: Uuid,
) -> Result<(), EngineError> {
    shape.normalize();

    let mut boards = state.boards.write().await;
    let board = boards
        .get_mut(&board_id)
        .ok_or(EngineError::BoardNotLoaded(board_id))?;

    match board.shape_index(shape.id()) {
        Some(index) => board.shapes[index] = shape.clone(),
        None => board.shapes.push(shape.clone()),
    }
    board.shapes_dirty = true;

    board.fanout(&Fact::ShapeCreated { shape }, Some(author));
    persistence::arm(board, state, board_id);
    Ok(())
}

// =============================================================================
// UPDATE
// =============================================================================

/// Apply a `shape-update` intent: merge the partial field map into the
/// matching shape. An unknown `shape_id` is a no-op, but the fact is still
/// broadcast so peers that materialized the shape locally converge.
///
/// Returns whether a shape was actually updated.
///
/// # Errors
///
/// Returns `BoardNotLoaded` if the board has no live state.
pub async fn update_shape(
    state: &AppState,
    board_id: Uuid,
    shape_id: Uuid,
    props: &Data,
    author: Uuid,
) -> Result<bool, EngineError> {
    let mut boards = state.boards.write().await;
    let board = boards
        .get_mut(&board_id)
        .ok_or(EngineError::BoardNotLoaded(board_id))?;

    let merged = match board.shape_index(shape_id) {
        Some(index) => {
            board.shapes[index].apply_props(props);
            board.shapes_dirty = true;
            true
        }
        None => {
            info!(%board_id, %shape_id, "update for unknown shape; broadcasting as no-op");
            false
        }
    };

    board.fanout(&Fact::ShapeUpdated { shape_id, props: props.clone() }, Some(author));
    if merged {
        persistence::arm(board, state, board_id);
    }
    Ok(merged)
}

// =============================================================================
// DELETE
// =============================================================================

/// Apply a `shape-delete` intent: remove the matching shape, leaving every
/// other entry (and the paint order) untouched. No-op when absent; the fact
/// is broadcast either way.
///
/// Returns whether a shape was actually removed.
///
/// # Errors
///
/// Returns `BoardNotLoaded` if the board has no live state.
pub async fn delete_shape(
    state: &AppState,
    board_id: Uuid,
    shape_id: Uuid,
    author: Uuid,
) -> Result<bool, EngineError> {
    let mut boards = state.boards.write().await;
    let board = boards
        .get_mut(&board_id)
        .ok_or(EngineError::BoardNotLoaded(board_id))?;

    let removed = match board.shape_index(shape_id) {
        Some(index) => {
            board.shapes.remove(index);
            board.shapes_dirty = true;
            true
        }
        None => false,
    };

    board.fanout(&Fact::ShapeDeleted { shape_id }, Some(author));
    if removed {
        persistence::arm(board, state, board_id);
    }
    Ok(removed)
}

// =============================================================================
// RENAME
// =============================================================================

/// Apply a `board-rename` intent. The name is trimmed; an empty result
/// collapses to the placeholder. Returns the effective name.
///
/// # Errors
///
/// Returns `BoardNotLoaded` if the board has no live state.
pub async fn rename_board(
    state: &AppState,
    board_id: Uuid,
    raw_name: &str,
    author: Uuid,
) -> Result<String, EngineError> {
    let name = effective_board_name(raw_name);

    let mut boards = state.boards.write().await;
    let board = boards
        .get_mut(&board_id)
        .ok_or(EngineError::BoardNotLoaded(board_id))?;

    board.name = name.clone();
    board.name_dirty = true;

    board.fanout(&Fact::BoardRenamed { name: name.clone() }, Some(author));
    persistence::arm(board, state, board_id);
    Ok(name)
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
