//! Error types for the permissions module.

use delegation_kernel_core::{CoreError, IntegrityError};
use thiserror::Error;

/// Errors that can occur while resolving permissions or data owners.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The requester lacks the access level needed.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A root delegation was requested by someone not allowed to create one.
    #[error("not eligible for a root delegation: {0}")]
    NotRootEligible(String),

    /// The data owner hierarchy loops back on itself.
    #[error("data owner hierarchy cycle at {0}")]
    HierarchyCycle(String),

    /// A parent data owner could not be found.
    #[error("unknown data owner: {0}")]
    UnknownDataOwner(String),

    /// The data owner lookup failed.
    #[error("data owner lookup failed: {0}")]
    Lookup(String),

    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
