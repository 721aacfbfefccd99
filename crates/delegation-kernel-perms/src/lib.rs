//! # Delegation Kernel Permissions
//!
//! Who is asking, and what may they grant.
//!
//! ## Overview
//!
//! - [`DataOwnerAuthenticationDetails`]: the principal of a request, made of
//!   an optional data owner (with a lazily resolved parent chain) and the
//!   hashes of the access-control secrets it presented.
//! - [`AccessContext`] / [`EntityAccess`]: the requester's effective access
//!   on one entity, inherited through the hierarchy and through legacy
//!   delegations.
//! - [`resolve_permission`]: the permission algebra. `FULL_WRITE` fails when
//!   the delegator cannot write, `MAX_WRITE` silently downgrades to read.
//!
//! ## Hierarchies
//!
//! A data owner may have a parent (a practice, an organisation). Access held
//! by a parent is inherited by its children. Parents are fetched through a
//! [`DataOwnerLookup`] on first use and memoized by [`LazyDataOwner`].

pub mod access;
pub mod auth;
pub mod error;
pub mod hierarchy;
pub mod permission;

pub use access::{AccessContext, EntityAccess};
pub use auth::{DataOwnerAuthenticationDetails, DataOwnerDetails, DataOwnerType};
pub use error::{PermsError, Result};
pub use hierarchy::{DataOwnerLookup, DataOwnerRecord, InMemoryDataOwnerDirectory, LazyDataOwner};
pub use permission::{check_root_eligibility, resolve_permission, RequestedPermission};
