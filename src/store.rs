//! Shape Store — the external document database, one record per board.
//!
//! SYSTEM CONTEXT
//! ==============
//! The store is a collaborator, not part of the synchronization core: the
//! engine owns live state in memory and the debounced writer pushes whole
//! shape lists here. Everything behind `ShapeStore` is replaceable — the
//! Postgres implementation below embeds the ordered shape list as a JSONB
//! array on the board row, and tests substitute an in-memory recorder.
//!
//! No multi-document transactional guarantees are assumed: every operation
//! is a single-row read or write keyed by board id.

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::shape::Shape;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored shape list failed to decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Full board record as persisted.
#[derive(Debug, Clone)]
pub struct BoardRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub shapes: Vec<Shape>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Listing row without the embedded shape list.
#[derive(Debug, Clone)]
pub struct BoardSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Interface to the board document store.
#[async_trait]
pub trait ShapeStore: Send + Sync {
    async fn create_board(
        &self,
        owner_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<BoardRecord, StoreError>;

    async fn list_boards(&self, owner_id: Uuid) -> Result<Vec<BoardSummary>, StoreError>;

    async fn get(&self, board_id: Uuid) -> Result<Option<BoardRecord>, StoreError>;

    /// Replace the whole embedded shape list. Overwriting a board that no
    /// longer exists is a no-op, not an error: the debounced writer may fire
    /// after a delete.
    async fn overwrite_shapes(&self, board_id: Uuid, shapes: &[Shape]) -> Result<(), StoreError>;

    async fn set_name(&self, board_id: Uuid, name: &str) -> Result<(), StoreError>;

    async fn set_description(&self, board_id: Uuid, description: Option<&str>) -> Result<(), StoreError>;

    /// Delete an owned board. Returns `false` when no owned row matched.
    async fn delete_board(&self, board_id: Uuid, owner_id: Uuid) -> Result<bool, StoreError>;
}

// =============================================================================
// POSTGRES IMPLEMENTATION
// =============================================================================

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type BoardRow = (
    Uuid,
    Uuid,
    String,
    Option<String>,
    serde_json::Value,
    OffsetDateTime,
    OffsetDateTime,
);

fn record_from_row(row: BoardRow) -> Result<BoardRecord, StoreError> {
    let (id, owner_id, name, description, shapes, created_at, updated_at) = row;
    let shapes: Vec<Shape> = serde_json::from_value(shapes)?;
    Ok(BoardRecord { id, owner_id, name, description, shapes, created_at, updated_at })
}

#[async_trait]
impl ShapeStore for PgStore {
    async fn create_board(
        &self,
        owner_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<BoardRecord, StoreError> {
        let id = Uuid::new_v4();
        let (created_at, updated_at) = sqlx::query_as::<_, (OffsetDateTime, OffsetDateTime)>(
            "INSERT INTO boards (id, owner_id, name, description) VALUES ($1, $2, $3, $4) \
             RETURNING created_at, updated_at",
        )
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        Ok(BoardRecord {
            id,
            owner_id,
            name: name.to_owned(),
            description: description.map(str::to_owned),
            shapes: Vec::new(),
            created_at,
            updated_at,
        })
    }

    async fn list_boards(&self, owner_id: Uuid) -> Result<Vec<BoardSummary>, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<String>, OffsetDateTime, OffsetDateTime)>(
            "SELECT id, name, description, created_at, updated_at \
             FROM boards WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, description, created_at, updated_at)| BoardSummary {
                id,
                name,
                description,
                created_at,
                updated_at,
            })
            .collect())
    }

    async fn get(&self, board_id: Uuid) -> Result<Option<BoardRecord>, StoreError> {
        let row = sqlx::query_as::<_, BoardRow>(
            "SELECT id, owner_id, name, description, shapes, created_at, updated_at \
             FROM boards WHERE id = $1",
        )
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn overwrite_shapes(&self, board_id: Uuid, shapes: &[Shape]) -> Result<(), StoreError> {
        let shapes = serde_json::to_value(shapes)?;
        sqlx::query("UPDATE boards SET shapes = $2, updated_at = now() WHERE id = $1")
            .bind(board_id)
            .bind(shapes)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_name(&self, board_id: Uuid, name: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE boards SET name = $2, updated_at = now() WHERE id = $1")
            .bind(board_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_description(&self, board_id: Uuid, description: Option<&str>) -> Result<(), StoreError> {
        sqlx::query("UPDATE boards SET description = $2, updated_at = now() WHERE id = $1")
            .bind(board_id)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_board(&self, board_id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1 AND owner_id = $2")
            .bind(board_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
