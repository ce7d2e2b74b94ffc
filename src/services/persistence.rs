//! Debounced Persistence Writer — coalesces mutation bursts into single
//! whole-record store writes.
//!
//! DESIGN
//! ======
//! Each board carries at most one armed flush task. Every mutation re-arms
//! it: the previous task is aborted and a fresh one sleeps for the debounce
//! quiet period, then re-snapshots whatever the state is *right now* and
//! issues one overwrite. A freehand stroke or a drag producing dozens of
//! intents inside the window therefore costs one write that reflects the
//! final state. Coalescing is by re-snapshot, never by diff merge.
//!
//! ERROR HANDLING
//! ==============
//! A failed write is logged and the dirty flags are restored; the broadcast
//! state is never rolled back and no immediate retry happens — the next
//! mutation's cycle writes the latest state anyway. Boards left dirty with
//! no timer (room emptied right after a failure) are picked up by the retry
//! sweep so they flush and evict instead of leaking.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::{AppState, BoardState};

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_RETRY_SWEEP_MS: u64 = 5000;

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Debounce quiet period from `FLUSH_DEBOUNCE_MS`.
#[must_use]
pub fn debounce_from_env() -> Duration {
    Duration::from_millis(env_parse("FLUSH_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS))
}

// =============================================================================
// ARM / FLUSH
// =============================================================================

/// (Re-)arm the board's pending flush. Called by the engine under the boards
/// write guard, immediately after a mutation: the previous timer is aborted
/// and replaced, so the quiet period is measured from the latest mutation.
pub fn arm(board: &mut BoardState, state: &AppState, board_id: Uuid) {
    if let Some(handle) = board.pending_flush.take() {
        handle.abort();
    }
    let state = state.clone();
    let delay = state.debounce;
    board.pending_flush = Some(tokio::spawn(flush_after(state, board_id, delay)));
}

/// Sleep out the quiet period, then snapshot and write.
///
/// Only the sleep is cancellable: once the task clears its own
/// `pending_flush` slot under the lock, a re-arm spawns a sibling instead of
/// aborting this one, so an issued store write always runs to completion.
async fn flush_after(state: AppState, board_id: Uuid, delay: Duration) {
    tokio::time::sleep(delay).await;

    // PHASE: SNAPSHOT UNDER LOCK
    // Clones the current record and clears dirty flags; the write itself
    // happens lock-free so slow store I/O never stalls intent handling.
    let (shapes, name) = {
        let mut boards = state.boards.write().await;
        let Some(board) = boards.get_mut(&board_id) else {
            // Board deleted while the timer ran; nothing to write.
            return;
        };
        board.pending_flush = None;
        let shapes = board.shapes_dirty.then(|| board.shapes.clone());
        let name = board.name_dirty.then(|| board.name.clone());
        board.shapes_dirty = false;
        board.name_dirty = false;
        (shapes, name)
    };

    // PHASE: WRITE OUTSIDE LOCK
    let mut shapes_failed = false;
    let mut name_failed = false;
    if let Some(shapes) = &shapes {
        if let Err(e) = state.store.overwrite_shapes(board_id, shapes).await {
            error!(error = %e, %board_id, count = shapes.len(), "shape flush failed");
            shapes_failed = true;
        }
    }
    if let Some(name) = &name {
        if let Err(e) = state.store.set_name(board_id, name).await {
            error!(error = %e, %board_id, "name flush failed");
            name_failed = true;
        }
    }

    // PHASE: RESTORE FLAGS + EVICT
    // Failed writes re-mark the board dirty for the next cycle. A room that
    // emptied while the flush was in flight is evicted here once clean.
    let mut boards = state.boards.write().await;
    let Some(board) = boards.get_mut(&board_id) else {
        return;
    };
    if shapes_failed {
        board.shapes_dirty = true;
    }
    if name_failed {
        board.name_dirty = true;
    }
    if board.clients.is_empty() && board.pending_flush.is_none() && !board.dirty() {
        boards.remove(&board_id);
        info!(%board_id, "evicted board after final flush");
    }
}

// =============================================================================
// RETRY SWEEP
// =============================================================================

/// Spawn the background sweep that re-arms boards left dirty with no pending
/// timer — the aftermath of a failed flush. Returns a handle for shutdown.
pub fn spawn_retry_sweep(state: AppState) -> JoinHandle<()> {
    let interval_ms = env_parse("RETRY_SWEEP_MS", DEFAULT_RETRY_SWEEP_MS);
    info!(interval_ms, "persistence retry sweep configured");
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            sweep_once(&state).await;
        }
    })
}

async fn sweep_once(state: &AppState) {
    let mut boards = state.boards.write().await;
    let stale: Vec<Uuid> = boards
        .iter()
        .filter(|(_, b)| b.dirty() && b.pending_flush.is_none())
        .map(|(id, _)| *id)
        .collect();
    for board_id in stale {
        if let Some(board) = boards.get_mut(&board_id) {
            info!(%board_id, "retry sweep re-arming flush");
            arm(board, state, board_id);
        }
    }
}

#[cfg(test)]
pub(crate) async fn sweep_once_for_tests(state: &AppState) {
    sweep_once(state).await;
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
