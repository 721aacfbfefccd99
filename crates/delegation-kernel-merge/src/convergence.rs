//! Convergence verification for replicated metadata.
//!
//! Two replicas of an entity have converged when their security metadata
//! has the same canonical digest. On divergence the delegation keys known
//! to only one side are reported, which is usually enough to tell which
//! writer's grants are missing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use delegation_kernel_core::{
    metadata_digest, DelegationKey, EntityId, MetadataDigest, SecuredEntity, SecurityMetadata,
};

use crate::error::Result;

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceResult {
    /// Both replicas hold identical metadata.
    Converged { digest: MetadataDigest },
    /// The metadata differs.
    Diverged {
        local: MetadataDigest,
        remote: MetadataDigest,
        only_local: BTreeSet<DelegationKey>,
        only_remote: BTreeSet<DelegationKey>,
    },
    /// The entity is missing on one side.
    NotConverged { reason: String },
}

impl ConvergenceResult {
    /// Check if the replicas have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged { .. })
    }
}

/// Compare two versions of an entity's metadata.
pub fn verify_convergence(local: &SecurityMetadata, remote: &SecurityMetadata) -> Result<ConvergenceResult> {
    let local_digest = metadata_digest(local)?;
    let remote_digest = metadata_digest(remote)?;
    if local_digest == remote_digest {
        return Ok(ConvergenceResult::Converged {
            digest: local_digest,
        });
    }

    let local_keys: BTreeSet<&DelegationKey> = local.secure_delegations.keys().collect();
    let remote_keys: BTreeSet<&DelegationKey> = remote.secure_delegations.keys().collect();
    Ok(ConvergenceResult::Diverged {
        local: local_digest,
        remote: remote_digest,
        only_local: local_keys.difference(&remote_keys).map(|k| (*k).clone()).collect(),
        only_remote: remote_keys.difference(&local_keys).map(|k| (*k).clone()).collect(),
    })
}

/// Batch verification of two replica sets, matched by entity id.
pub fn verify_all_entities(
    local: &[SecuredEntity],
    remote: &[SecuredEntity],
) -> Result<Vec<(EntityId, ConvergenceResult)>> {
    let remote_by_id: BTreeMap<&EntityId, &SecuredEntity> = remote.iter().map(|e| (&e.id, e)).collect();
    let local_ids: BTreeSet<&EntityId> = local.iter().map(|e| &e.id).collect();

    let mut results = Vec::with_capacity(local.len());
    for entity in local {
        let result = match remote_by_id.get(&entity.id) {
            Some(other) => verify_convergence(&entity.security_metadata, &other.security_metadata)?,
            None => ConvergenceResult::NotConverged {
                reason: "entity not found remotely".into(),
            },
        };
        results.push((entity.id.clone(), result));
    }
    for id in remote_by_id.keys().filter(|id| !local_ids.contains(*id)) {
        results.push((
            (*id).clone(),
            ConvergenceResult::NotConverged {
                reason: "entity not found locally".into(),
            },
        ));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_versions;
    use delegation_kernel_core::{hash_secret, AccessLevel, SecureDelegation};
    use delegation_kernel_testkit::generators::security_metadata;
    use proptest::prelude::*;

    fn with_delegation(secret: u8) -> SecurityMetadata {
        let mut md = SecurityMetadata::new();
        md.insert_delegation(
            hash_secret(&[secret; 16]),
            SecureDelegation::new(None, Some("doc1".into()), AccessLevel::Write),
        )
        .unwrap();
        md
    }

    #[test]
    fn test_divergence_reports_missing_keys() {
        let a = with_delegation(1);
        let b = with_delegation(2);
        match verify_convergence(&a, &b).unwrap() {
            ConvergenceResult::Diverged {
                only_local,
                only_remote,
                ..
            } => {
                assert_eq!(only_local, BTreeSet::from([hash_secret(&[1; 16])]));
                assert_eq!(only_remote, BTreeSet::from([hash_secret(&[2; 16])]));
            }
            other => panic!("expected divergence, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_both_ways_converges() {
        let a = with_delegation(1);
        let b = with_delegation(2);
        let ab = merge_versions(&a, &b).unwrap();
        let ba = merge_versions(&b, &a).unwrap();
        assert!(verify_convergence(&ab, &ba).unwrap().is_converged());
    }

    #[test]
    fn test_verify_all_entities_reports_missing() {
        let local = vec![SecuredEntity::new("e1").with_metadata(with_delegation(1)), SecuredEntity::new("e2")];
        let remote = vec![SecuredEntity::new("e1").with_metadata(with_delegation(1)), SecuredEntity::new("e3")];
        let results = verify_all_entities(&local, &remote).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_converged());
        assert!(!results[1].1.is_converged());
        assert_eq!(results[2].0, EntityId::new("e3"));
    }

    proptest! {
        #[test]
        fn prop_digest_equality_matches_value_equality(a in security_metadata(), b in security_metadata()) {
            prop_assert!(verify_convergence(&a, &a).unwrap().is_converged());
            prop_assert_eq!(verify_convergence(&a, &b).unwrap().is_converged(), a == b);
        }
    }
}
