//! Error types for the store module.

use thiserror::Error;

use delegation_kernel_core::{CoreError, EntityId, IntegrityError, Revision};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Encoding or decoding of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Entity not found.
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// The stored revision is not the expected one.
    #[error("conflict on entity {entity_id}: expected revision {expected:?}, found {actual:?}")]
    Conflict {
        entity_id: EntityId,
        expected: Option<Revision>,
        actual: Option<Revision>,
    },

    /// Stored metadata breaks a graph invariant.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// A lock guarding in-memory state was poisoned.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
