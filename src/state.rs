//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the two external collaborators (shape store, identity verifier) as
//! trait objects plus a map of live board rooms. Each live board carries the
//! authoritative in-memory record: the paint-ordered shape list, the board
//! name, connected session senders, and the debounced-flush bookkeeping.
//!
//! Only the synchronization engine mutates `shapes` and `name`; the registry
//! and the persistence writer read snapshots. The `RwLock` write guard is
//! what serializes a room's mutations, so last-write-wins is defined by
//! arrival order at the lock rather than by any per-field metadata.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::protocol::Fact;
use crate::services::auth::IdentityVerifier;
use crate::shape::Shape;
use crate::store::ShapeStore;

// =============================================================================
// BOARD STATE
// =============================================================================

/// Presence attributes for one connected session.
#[derive(Debug, Clone)]
pub struct ConnectedClient {
    pub user_id: Uuid,
    pub display_name: String,
    pub color: String,
}

/// Per-board live state. Kept in memory while any session is connected or a
/// flush is outstanding; hydrated from the store on first join.
pub struct BoardState {
    /// Current display name (may be ahead of the store until flushed).
    pub name: String,
    /// Authoritative shape list in paint order: later entries draw on top.
    pub shapes: Vec<Shape>,
    /// Connected sessions: `session_id` -> sender for outgoing facts.
    pub clients: HashMap<Uuid, mpsc::Sender<Fact>>,
    /// Presence attributes keyed by session.
    pub users: HashMap<Uuid, ConnectedClient>,
    /// Shape list changed since the last successful flush.
    pub shapes_dirty: bool,
    /// Name changed since the last successful flush.
    pub name_dirty: bool,
    /// The armed debounce task, if any. Re-arming aborts and replaces it.
    pub pending_flush: Option<JoinHandle<()>>,
}

impl BoardState {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            shapes: Vec::new(),
            clients: HashMap::new(),
            users: HashMap::new(),
            shapes_dirty: false,
            name_dirty: false,
            pending_flush: None,
        }
    }

    /// Position of a shape in paint order, if present.
    #[must_use]
    pub fn shape_index(&self, shape_id: Uuid) -> Option<usize> {
        self.shapes.iter().position(|s| s.id() == shape_id)
    }

    /// Anything awaiting a store write?
    #[must_use]
    pub fn dirty(&self) -> bool {
        self.shapes_dirty || self.name_dirty
    }

    /// Deliver a fact to every connected session except `exclude`.
    ///
    /// Best-effort `try_send`: a session whose channel is full misses this
    /// fact rather than stalling the engine. Safe to call under the boards
    /// write guard, which is what keeps fan-out in apply order.
    pub fn fanout(&self, fact: &Fact, exclude: Option<Uuid>) {
        for (session_id, tx) in &self.clients {
            if exclude == Some(*session_id) {
                continue;
            }
            let _ = tx.try_send(fact.clone());
        }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ShapeStore>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub boards: Arc<RwLock<HashMap<Uuid, BoardState>>>,
    /// Quiet period between the last mutation and the persisted snapshot.
    pub debounce: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn ShapeStore>, verifier: Arc<dyn IdentityVerifier>, debounce: Duration) -> Self {
        Self { store, verifier, boards: Arc::new(RwLock::new(HashMap::new())), debounce }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
