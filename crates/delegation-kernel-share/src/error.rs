//! Error types for share request handling.
//!
//! Only structural and fatal problems are errors. A request that cannot be
//! applied to its entity is reported as a [`crate::RejectedRequest`].

use delegation_kernel_core::{CoreError, EntityId, IntegrityError};
use delegation_kernel_perms::PermsError;
use thiserror::Error;

/// Structural problems found before any entity is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("requests {first} and {second} for entity {entity_id} share an access control key")]
    DuplicateAccessControlKey {
        entity_id: EntityId,
        first: String,
        second: String,
    },

    #[error("entity {entity_id} has more than one ROOT request")]
    MultipleRootRequests { entity_id: EntityId },

    #[error("request {request_id} for entity {entity_id} has no access control keys")]
    EmptyAccessControlKeys {
        entity_id: EntityId,
        request_id: String,
    },

    #[error("request {request_id} for entity {entity_id} has a malformed access control key: {reason}")]
    MalformedAccessControlKey {
        entity_id: EntityId,
        request_id: String,
        reason: String,
    },

    #[error("request {request_id} for entity {entity_id}: {reason}")]
    ExchangeDataMismatch {
        entity_id: EntityId,
        request_id: String,
        reason: String,
    },
}

/// Errors raised while validating or applying a batch.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("invalid batch: {0}")]
    Validation(#[from] ValidationError),

    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("permissions error: {0}")]
    Perms(#[from] PermsError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for share operations.
pub type Result<T> = std::result::Result<T, ShareError>;
