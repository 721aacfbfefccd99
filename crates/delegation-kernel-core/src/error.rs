//! Error types for the delegation kernel core.

use thiserror::Error;

/// Fatal data-integrity errors.
///
/// These are never resolved by guessing: they signal corrupted or
/// irreconcilable security metadata and require operator intervention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("key equivalence cycle detected at {key}")]
    EquivalenceCycle { key: String },

    #[error("parent delegation cycle detected at {key}")]
    ParentCycle { key: String },

    #[error("delegation {delegation} references unknown parent {parent}")]
    DanglingParent { delegation: String, parent: String },

    #[error("equivalence {alias} resolves to {target} which is not a delegation")]
    DanglingEquivalence { alias: String, target: String },

    #[error("key {key} is both a delegation key and an equivalence")]
    AmbiguousKey { key: String },

    #[error("invalid delegation {key}: {reason}")]
    InvalidDelegation { key: String, reason: String },
}

/// Core errors that can occur while working with security metadata.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("invalid access control key: {0}")]
    InvalidAccessControlKey(String),

    #[error("unknown delegation: {0}")]
    UnknownDelegation(String),

    #[error("delegation key already in use: {0}")]
    DuplicateDelegationKey(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

impl CoreError {
    /// Whether this error is a fatal integrity problem.
    pub fn is_integrity(&self) -> bool {
        matches!(self, CoreError::Integrity(_))
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
