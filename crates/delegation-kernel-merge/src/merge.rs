//! Merging two versions of security metadata.
//!
//! Both merges align the two sides on canonical keys, then combine the
//! delegations found under the same canonical key. Ciphertext sets are
//! unioned so no grant added by either writer is lost.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use delegation_kernel_core::{
    AccessLevel, DelegationKey, SecureDelegation, SecurityMetadata,
};

use crate::error::{MergeError, Result};

/// How delegations present on both sides are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MergeMode {
    /// Two revisions of the same entity.
    Versions,
    /// Two entities standing for the same subject.
    Duplicates,
}

/// Merge a locally computed version with the currently stored one.
///
/// Used after a write conflict. Delegations from both sides are kept; for a
/// delegation present on both, ciphertext sets and parents are unioned and
/// the higher access level is kept. The result is validated before it is
/// returned.
///
/// Fails with [`MergeError::Conflict`] when an alias resolves to different
/// canonical keys on the two sides, when a key is a delegation on one side
/// and an alias on the other, or when the two delegations under one key
/// name different parties.
pub fn merge_versions(local: &SecurityMetadata, current: &SecurityMetadata) -> Result<SecurityMetadata> {
    merge(local, current, MergeMode::Versions)
}

/// Merge the metadata of a duplicate entity into `into`.
///
/// Not commutative. Encryption keys of `other` are not imported into
/// delegations `into` already has, since they were encrypted for a different
/// entity. A delegation that is a root on either side stays a root.
pub fn merge_duplicated_into(into: &SecurityMetadata, other: &SecurityMetadata) -> Result<SecurityMetadata> {
    merge(into, other, MergeMode::Duplicates)
}

fn merge(local: &SecurityMetadata, current: &SecurityMetadata, mode: MergeMode) -> Result<SecurityMetadata> {
    let local_keys = full_equivalences(local)?;
    let mut merged_keys = full_equivalences(current)?;

    for (key, canonical) in local_keys {
        match merged_keys.get(&key) {
            Some(existing) if *existing != canonical => {
                warn!(key = %key.short(), "irreconcilable canonical key during merge");
                return Err(MergeError::Conflict {
                    reason: format!(
                        "resolves to {} locally and to {} in the current version",
                        canonical.short(),
                        existing.short()
                    ),
                    key,
                });
            }
            _ => {
                merged_keys.insert(key, canonical);
            }
        }
    }

    let canonicals: BTreeSet<&DelegationKey> = merged_keys.values().collect();
    let mut secure_delegations = BTreeMap::new();
    for canonical in canonicals {
        let merged = match (
            local.secure_delegations.get(canonical),
            current.secure_delegations.get(canonical),
        ) {
            (Some(l), Some(c)) => merge_delegations(canonical, l, c, mode)?,
            (Some(d), None) | (None, Some(d)) => d.clone(),
            (None, None) => {
                return Err(MergeError::Conflict {
                    key: canonical.clone(),
                    reason: "canonical key without a delegation on either side".to_string(),
                })
            }
        };
        secure_delegations.insert(canonical.clone(), merged);
    }

    let keys_equivalences = merged_keys
        .into_iter()
        .filter(|(k, v)| k != v)
        .collect();

    let merged = SecurityMetadata {
        secure_delegations,
        keys_equivalences,
    };
    merged.validate()?;
    debug!(
        delegations = merged.secure_delegations.len(),
        equivalences = merged.keys_equivalences.len(),
        ?mode,
        "merged security metadata"
    );
    Ok(merged)
}

/// Every key of `metadata` mapped to its canonical key, delegation keys
/// included as mapping to themselves.
fn full_equivalences(metadata: &SecurityMetadata) -> Result<BTreeMap<DelegationKey, DelegationKey>> {
    let mut full: BTreeMap<DelegationKey, DelegationKey> = metadata
        .secure_delegations
        .keys()
        .map(|k| (k.clone(), k.clone()))
        .collect();
    for alias in metadata.keys_equivalences.keys() {
        let canonical = metadata.canonicalize(alias.as_str())?;
        if full.insert(alias.clone(), canonical).is_some() {
            return Err(MergeError::Conflict {
                key: alias.clone(),
                reason: "key is both a delegation and an alias".to_string(),
            });
        }
    }
    Ok(full)
}

fn merge_delegations(
    key: &DelegationKey,
    local: &SecureDelegation,
    current: &SecureDelegation,
    mode: MergeMode,
) -> Result<SecureDelegation> {
    if local.delegator != current.delegator
        || local.delegate != current.delegate
        || local.exchange_data_id != current.exchange_data_id
    {
        return Err(MergeError::Conflict {
            key: key.clone(),
            reason: "delegations name different parties or exchange data".to_string(),
        });
    }

    let mut merged = local.clone();
    merged.secret_ids.extend(current.secret_ids.iter().cloned());
    merged.owning_entity_ids.extend(current.owning_entity_ids.iter().cloned());
    merged.permissions = local.permissions.combine(current.permissions);

    match mode {
        MergeMode::Versions => {
            merged.encryption_keys.extend(current.encryption_keys.iter().cloned());
            merged.parent_delegations.extend(current.parent_delegations.iter().cloned());
        }
        MergeMode::Duplicates => {
            if local.is_root() || current.is_root() {
                merged.parent_delegations.clear();
                merged.permissions = AccessLevel::Write;
            } else {
                merged.parent_delegations.extend(current.parent_delegations.iter().cloned());
            }
        }
    }
    Ok(merged)
}
