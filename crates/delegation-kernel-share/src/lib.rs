//! # Delegation Kernel Share
//!
//! Bulk share and metadata update requests.
//!
//! ## Flow
//!
//! 1. [`validate_bulk_params`] checks the whole batch. Any structural error
//!    (access-control keys reused across requests of an entity, two ROOT
//!    requests, inconsistent exchange data fields, malformed keys) fails
//!    the batch before anything is read or written.
//! 2. [`apply_entity_requests`] applies the requests of one entity to a
//!    snapshot of it and returns the next metadata together with the ids of
//!    the accepted requests and the reasons for the rejected ones.
//! 3. The caller saves the new metadata and reports an
//!    [`EntityBulkShareResult`] per entity.
//!
//! Per-request failures never surface as `Err`; they are
//! [`RejectedRequest`]s with an HTTP-like code and a retry hint.

pub mod apply;
pub mod error;
pub mod request;
pub mod result;
pub mod validation;

pub use apply::{apply_entity_requests, ApplyConfig, ApplyOutcome};
pub use error::{Result, ShareError, ValidationError};
pub use request::{
    BulkShareOrUpdateMetadataParams, EntityShareRequest, EntitySharedMetadataUpdateRequest,
    EntryUpdateType, ShareEntityRequestDetails, ShareOrUpdateRequest,
};
pub use result::{EntityBulkShareResult, RejectedRequest, RejectionCode};
pub use validation::{validate_bulk_params, validate_entity_requests};
