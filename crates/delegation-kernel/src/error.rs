//! Error types for the Kernel.

use delegation_kernel_core::{EntityId, IntegrityError};
use delegation_kernel_merge::MergeError;
use delegation_kernel_perms::PermsError;
use delegation_kernel_share::{ShareError, ValidationError};
use delegation_kernel_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Kernel operations.
///
/// Rejections of single requests are not errors; they are reported in
/// [`EntityBulkShareResult`](delegation_kernel_share::EntityBulkShareResult).
#[derive(Debug, Error)]
pub enum KernelError {
    /// The batch is structurally invalid; nothing was applied.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("share error: {0}")]
    Share(#[from] ShareError),

    /// Hierarchy lookup or permission error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// Merge after a write conflict failed.
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Metadata about to be saved breaks a graph invariant.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Entity not found.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Entity already exists.
    #[error("entity already exists: {0}")]
    EntityExists(EntityId),

    /// Every save attempt hit a concurrent write.
    #[error("entity {entity_id} still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { entity_id: EntityId, attempts: u32 },
}

impl KernelError {
    /// Whether the error needs an operator rather than a retry.
    pub fn is_fatal(&self) -> bool {
        match self {
            KernelError::Integrity(_) => true,
            KernelError::Merge(_) => true,
            KernelError::Share(ShareError::Integrity(_)) => true,
            KernelError::Store(StoreError::Integrity(_)) => true,
            _ => false,
        }
    }
}

/// Result type for Kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
