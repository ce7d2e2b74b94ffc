//! Wire protocol — intents in, facts out.
//!
//! ARCHITECTURE
//! ============
//! Clients submit *intents* (requests to mutate shared state) over the
//! WebSocket as JSON text messages tagged by `event`. The server applies an
//! intent and broadcasts the mirrored *fact* to every other session in the
//! room; the author never receives its own fact back.
//!
//! DESIGN
//! ======
//! The vocabulary is closed, so both directions are tagged enums: serde
//! rejects unknown events and missing required fields before dispatch ever
//! sees them. The live channel is fire-and-forget — a malformed intent is
//! dropped and logged, never answered with an error. The one exception is
//! `join-room`, which behaves as a request/response pair (`room-joined` or
//! `error`) because the joiner needs the snapshot to render anything at all.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shape::{self, Data, Shape};

/// Board names longer than this are rejected as malformed.
pub const MAX_BOARD_NAME_LEN: usize = 120;

/// Fallback when a rename collapses to the empty string after trimming.
pub const DEFAULT_BOARD_NAME: &str = "Untitled Board";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid intent json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid shape: {0}")]
    Shape(#[from] shape::ShapeError),
    #[error("board name exceeds {MAX_BOARD_NAME_LEN} characters")]
    NameTooLong,
}

/// Client-submitted mutation request, not yet applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Intent {
    JoinRoom { board_id: Uuid },
    ShapeCreate { board_id: Uuid, shape: Shape },
    ShapeUpdate { board_id: Uuid, shape_id: Uuid, props: Data },
    ShapeDelete { board_id: Uuid, shape_id: Uuid },
    BoardRename { board_id: Uuid, name: String },
}

/// Server-confirmed notification that a mutation was applied, plus the
/// session-scoped replies and presence traffic that share the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Fact {
    SessionConnected { session_id: Uuid, display_name: String },
    RoomJoined { board_id: Uuid, name: String, shapes: Vec<Shape> },
    ShapeCreated { shape: Shape },
    ShapeUpdated { shape_id: Uuid, props: Data },
    ShapeDeleted { shape_id: Uuid },
    BoardRenamed { name: String },
    ShapesReplaced { shapes: Vec<Shape> },
    BoardDeleted,
    PresenceJoined { session_id: Uuid, display_name: String, color: String },
    PresenceLeft { session_id: Uuid },
    Error { message: String },
}

// =============================================================================
// PARSE + VALIDATE
// =============================================================================

impl Intent {
    /// Decode one inbound text message and check payload invariants.
    ///
    /// # Errors
    ///
    /// Returns a `ProtocolError` for unknown events, missing fields, invalid
    /// shapes, ill-typed props, or an over-long board name. Callers drop the
    /// intent on error; nothing is applied or broadcast.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let intent: Self = serde_json::from_str(text)?;
        intent.validate()?;
        Ok(intent)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::JoinRoom { .. } | Self::ShapeDelete { .. } => Ok(()),
            Self::ShapeCreate { shape, .. } => Ok(shape.validate()?),
            Self::ShapeUpdate { props, .. } => Ok(shape::validate_props(props)?),
            Self::BoardRename { name, .. } => {
                if name.trim().chars().count() > MAX_BOARD_NAME_LEN {
                    return Err(ProtocolError::NameTooLong);
                }
                Ok(())
            }
        }
    }

    /// The board this intent is addressed to.
    #[must_use]
    pub fn board_id(&self) -> Uuid {
        match self {
            Self::JoinRoom { board_id }
            | Self::ShapeCreate { board_id, .. }
            | Self::ShapeUpdate { board_id, .. }
            | Self::ShapeDelete { board_id, .. }
            | Self::BoardRename { board_id, .. } => *board_id,
        }
    }
}

/// Apply the rename collapse rule: trim, and fall back to the placeholder
/// when nothing is left.
#[must_use]
pub fn effective_board_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() { DEFAULT_BOARD_NAME.to_owned() } else { trimmed.to_owned() }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
