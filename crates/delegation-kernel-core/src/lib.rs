//! # Delegation Kernel Core
//!
//! Pure primitives for the delegation kernel: access-control keys, secure
//! delegations and the per-entity security metadata graph.
//!
//! This crate contains no I/O, no storage, no async. Every operation is a
//! pure function over an in-memory snapshot of an entity's metadata.
//!
//! ## Key Types
//!
//! - [`DelegationKey`] - Key of a delegation: a data owner id or the SHA-256 hex of an access-control key
//! - [`SecureDelegation`] - One edge of the delegation graph, carrying opaque ciphertexts
//! - [`SecurityMetadata`] - Delegations of one entity plus the key-equivalence table
//! - [`SecuredEntity`] - A versioned entity holding security metadata
//!
//! ## Anonymity
//!
//! Access-control secrets are reduced to hashes by [`access_key::hash_secret`] before
//! they are compared with delegation keys. See the [`access_key`] module.

pub mod access_key;
pub mod canonical;
pub mod delegation;
pub mod entity;
pub mod error;
pub mod metadata;
pub mod types;

pub use access_key::{digests_equal, hash_secret, resolve_hashes, AccessControlKey};
pub use canonical::{canonical_metadata_bytes, metadata_digest, metadata_from_canonical_bytes, MetadataDigest};
pub use delegation::{AccessLevel, CiphertextField, SecureDelegation};
pub use entity::SecuredEntity;
pub use error::{CoreError, IntegrityError, Result};
pub use metadata::SecurityMetadata;
pub use types::{Base64String, DataOwnerId, DelegationKey, EntityId, Revision};
