//! Accessor index entries.
//!
//! The index maps an accessor (data owner id or delegation key hash) to the
//! entities it can reach. Entries come straight from
//! [`SecurityMetadata::resolve_accessors`], so queries through the index and
//! access checks on the metadata always agree.

use std::collections::BTreeMap;

use delegation_kernel_core::{AccessLevel, IntegrityError, SecurityMetadata};

/// Index entries for one entity's metadata.
pub fn index_entries(
    metadata: &SecurityMetadata,
) -> std::result::Result<BTreeMap<String, AccessLevel>, IntegrityError> {
    metadata.resolve_accessors()
}

/// Stored form of an access level.
pub(crate) fn level_to_i64(level: AccessLevel) -> i64 {
    match level {
        AccessLevel::Read => 1,
        AccessLevel::Write => 2,
    }
}

pub(crate) fn level_from_i64(value: i64) -> Option<AccessLevel> {
    match value {
        1 => Some(AccessLevel::Read),
        2 => Some(AccessLevel::Write),
        _ => None,
    }
}
