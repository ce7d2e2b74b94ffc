//! Board CRUD routes — owner-scoped REST surface.
//!
//! DESIGN
//! ======
//! Plain request/response against the store; no concurrency hazard lives
//! here. The only coupling to the live sync path: mutations that touch a
//! board with an active room update the in-memory record and broadcast the
//! matching fact, so connected sessions never render stale metadata.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::{Fact, MAX_BOARD_NAME_LEN};
use crate::routes::auth::AuthUser;
use crate::services::room;
use crate::shape::Shape;
use crate::state::AppState;
use crate::store::{BoardRecord, BoardSummary, StoreError};

const MAX_DESCRIPTION_LEN: usize = 500;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Serialize)]
pub struct BoardResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

fn to_response(record: BoardRecord) -> BoardResponse {
    BoardResponse {
        id: record.id,
        name: record.name,
        description: record.description,
        owner_id: record.owner_id,
        created_at_ms: record.created_at.unix_timestamp() * 1000,
        updated_at_ms: record.updated_at.unix_timestamp() * 1000,
    }
}

#[derive(Serialize)]
pub struct BoardSummaryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

fn to_summary_response(row: BoardSummary) -> BoardSummaryResponse {
    BoardSummaryResponse {
        id: row.id,
        name: row.name,
        description: row.description,
        created_at_ms: row.created_at.unix_timestamp() * 1000,
        updated_at_ms: row.updated_at.unix_timestamp() * 1000,
    }
}

#[derive(Deserialize)]
pub struct CreateBoardBody {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateBoardBody {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
}

/// Distinguish an absent `description` key from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

pub(crate) fn validate_name(raw: &str) -> Result<String, StatusCode> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_BOARD_NAME_LEN {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn validate_description(raw: Option<&str>) -> Result<Option<String>, StatusCode> {
    match raw {
        None => Ok(None),
        Some(text) if text.chars().count() > MAX_DESCRIPTION_LEN => Err(StatusCode::UNPROCESSABLE_ENTITY),
        Some(text) => Ok(Some(text.to_owned())),
    }
}

fn store_error_to_status(err: &StoreError) -> StatusCode {
    tracing::error!(error = %err, "board store operation failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Fetch a record and enforce ownership. Foreign boards read as missing.
async fn owned_board(state: &AppState, board_id: Uuid, owner_id: Uuid) -> Result<BoardRecord, StatusCode> {
    let record = state
        .store
        .get(board_id)
        .await
        .map_err(|e| store_error_to_status(&e))?
        .ok_or(StatusCode::NOT_FOUND)?;
    if record.owner_id != owner_id {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(record)
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/boards` — create a board.
pub async fn create_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateBoardBody>,
) -> Result<(StatusCode, Json<BoardResponse>), StatusCode> {
    let name = validate_name(&body.name)?;
    let description = validate_description(body.description.as_deref())?;

    let record = state
        .store
        .create_board(auth.user.id, &name, description.as_deref())
        .await
        .map_err(|e| store_error_to_status(&e))?;

    Ok((StatusCode::CREATED, Json(to_response(record))))
}

/// `GET /api/boards` — list the caller's boards.
pub async fn list_boards(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<BoardSummaryResponse>>, StatusCode> {
    let rows = state
        .store
        .list_boards(auth.user.id)
        .await
        .map_err(|e| store_error_to_status(&e))?;
    Ok(Json(rows.into_iter().map(to_summary_response).collect()))
}

/// `GET /api/boards/:id` — fetch one board.
pub async fn get_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(board_id): Path<Uuid>,
) -> Result<Json<BoardResponse>, StatusCode> {
    let record = owned_board(&state, board_id, auth.user.id).await?;
    Ok(Json(to_response(record)))
}

/// `PATCH /api/boards/:id` — rename / edit description.
pub async fn update_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(board_id): Path<Uuid>,
    Json(body): Json<UpdateBoardBody>,
) -> Result<Json<BoardResponse>, StatusCode> {
    owned_board(&state, board_id, auth.user.id).await?;

    if let Some(raw) = body.name.as_deref() {
        let name = validate_name(raw)?;
        state
            .store
            .set_name(board_id, &name)
            .await
            .map_err(|e| store_error_to_status(&e))?;

        // Keep any live room coherent and tell connected sessions.
        {
            let mut boards = state.boards.write().await;
            if let Some(board) = boards.get_mut(&board_id) {
                board.name.clone_from(&name);
                board.name_dirty = false;
            }
        }
        room::broadcast(&state, board_id, &Fact::BoardRenamed { name }, None).await;
    }

    if let Some(description) = body.description {
        let description = validate_description(description.as_deref())?;
        state
            .store
            .set_description(board_id, description.as_deref())
            .await
            .map_err(|e| store_error_to_status(&e))?;
    }

    let record = owned_board(&state, board_id, auth.user.id).await?;
    Ok(Json(to_response(record)))
}

/// `DELETE /api/boards/:id` — delete a board and invalidate its live room.
pub async fn delete_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(board_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let deleted = state
        .store
        .delete_board(board_id, auth.user.id)
        .await
        .map_err(|e| store_error_to_status(&e))?;
    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }

    // Evict live state. Any armed flush finds nothing and returns; a write
    // already in flight lands on the deleted id as a store no-op.
    let evicted = {
        let mut boards = state.boards.write().await;
        boards.remove(&board_id)
    };
    if let Some(board) = evicted {
        board.fanout(&Fact::BoardDeleted, None);
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/boards/:id/shapes` — shape list, live state preferred.
pub async fn list_shapes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(board_id): Path<Uuid>,
) -> Result<Json<Vec<Shape>>, StatusCode> {
    let record = owned_board(&state, board_id, auth.user.id).await?;

    // A live room is authoritative and possibly ahead of the store.
    {
        let boards = state.boards.read().await;
        if let Some(board) = boards.get(&board_id) {
            return Ok(Json(board.shapes.clone()));
        }
    }

    Ok(Json(record.shapes))
}

/// `PUT /api/boards/:id/shapes` — bulk overwrite the shape list.
pub async fn overwrite_shapes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(board_id): Path<Uuid>,
    Json(shapes): Json<Vec<Shape>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    owned_board(&state, board_id, auth.user.id).await?;

    let mut shapes = shapes;
    for shape in &mut shapes {
        shape.validate().map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;
        shape.normalize();
    }

    state
        .store
        .overwrite_shapes(board_id, &shapes)
        .await
        .map_err(|e| store_error_to_status(&e))?;

    {
        let mut boards = state.boards.write().await;
        if let Some(board) = boards.get_mut(&board_id) {
            board.shapes.clone_from(&shapes);
            board.shapes_dirty = false;
        }
    }
    room::broadcast(&state, board_id, &Fact::ShapesReplaced { shapes }, None).await;

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
#[path = "boards_test.rs"]
mod tests;
