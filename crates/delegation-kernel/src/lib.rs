//! # Delegation Kernel
//!
//! The unified API for secure delegations: who may read or write an entity,
//! and how that access is shared onwards.
//!
//! ## Overview
//!
//! Every entity carries security metadata: a graph of secure delegations
//! keyed by data owner id or by the hash of an access-control secret, plus
//! a table of equivalent keys. The kernel provides:
//!
//! - **Sharing**: bulk creation of delegations from share requests
//! - **Updates**: adding and removing ciphertext entries on delegations
//! - **Queries**: the level a requester holds on an entity, and every entity
//!   it can reach
//! - **Merging**: concurrent versions of an entity, and duplicate entities
//!
//! ## Key Concepts
//!
//! - **Root delegation**: a self delegation with no parents. Every other
//!   delegation descends from one.
//! - **Anonymous delegation**: delegator or delegate left out, reachable only
//!   by whoever holds the access-control secret.
//! - **Hierarchy**: a data owner inherits the access of its parents.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use delegation_kernel::{Kernel, KernelConfig};
//! use delegation_kernel::share::{
//!     BulkShareOrUpdateMetadataParams, EntityShareRequest, ShareEntityRequestDetails,
//! };
//! use delegation_kernel::perms::{DataOwnerAuthenticationDetails, RequestedPermission};
//! use delegation_kernel::store::SqliteStore;
//!
//! async fn example(details: DataOwnerAuthenticationDetails) {
//!     // Open storage
//!     let store = SqliteStore::open("entities.db").unwrap();
//!
//!     // Create the kernel
//!     let kernel = Kernel::new(store, KernelConfig::default());
//!     kernel.create_entity("patient-file-1", []).await.unwrap();
//!
//!     // Root the entity for the requester
//!     let root = EntityShareRequest::new(["0123456789abcdef0123456789abcdef"])
//!         .with_delegator("doc1")
//!         .with_delegate("doc1")
//!         .with_exchange_data_id("self-doc1")
//!         .with_permission(RequestedPermission::Root);
//!     let params = BulkShareOrUpdateMetadataParams::new().with_entity(
//!         "patient-file-1",
//!         ShareEntityRequestDetails::new().with_request("root", root),
//!     );
//!     let results = kernel
//!         .bulk_share_or_update_metadata(&params, &details)
//!         .await
//!         .unwrap();
//!     assert!(results[0].is_success());
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `delegation_kernel::core` - Keys, delegations and security metadata
//! - `delegation_kernel::perms` - Requesters, hierarchies and the permission algebra
//! - `delegation_kernel::share` - Share and update requests
//! - `delegation_kernel::merge` - Merging concurrent or duplicate metadata
//! - `delegation_kernel::store` - Storage abstraction and SQLite

pub mod error;
pub mod kernel;

// Re-export component crates
pub use delegation_kernel_core as core;
pub use delegation_kernel_merge as merge;
pub use delegation_kernel_perms as perms;
pub use delegation_kernel_share as share;
pub use delegation_kernel_store as store;

// Re-export main types for convenience
pub use error::{KernelError, Result};
pub use kernel::{Kernel, KernelConfig};

// Re-export commonly used types
pub use delegation_kernel_core::{
    AccessLevel, DataOwnerId, DelegationKey, EntityId, SecureDelegation, SecuredEntity,
    SecurityMetadata,
};
pub use delegation_kernel_share::{
    BulkShareOrUpdateMetadataParams, EntityBulkShareResult, RejectedRequest, RejectionCode,
};
