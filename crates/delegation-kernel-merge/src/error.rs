//! Error types for the merge module.

use thiserror::Error;

use delegation_kernel_core::{CoreError, DelegationKey, IntegrityError};

/// Errors that can occur while merging metadata.
///
/// Every variant is fatal: a merge never guesses.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The two versions disagree on what a key stands for.
    #[error("merge conflict on key {key}: {reason}")]
    Conflict { key: DelegationKey, reason: String },

    /// One of the inputs, or the merged result, breaks a graph invariant.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;
