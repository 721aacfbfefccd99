//! Effective access of a requester on one entity.
//!
//! [`AccessContext`] is computed once per request (it may need hierarchy
//! lookups). [`EntityAccess`] is then computed synchronously for every
//! entity of the batch.

use std::collections::BTreeSet;

use delegation_kernel_core::{
    AccessLevel, DataOwnerId, DelegationKey, IntegrityError, SecurityMetadata,
};

use crate::auth::{DataOwnerAuthenticationDetails, DataOwnerType};
use crate::error::Result;

/// Everything a requester may act as, resolved up front.
#[derive(Clone, Debug, Default)]
pub struct AccessContext {
    data_owner_type: Option<DataOwnerType>,
    hierarchy_ids: Vec<DataOwnerId>,
    access_control_keys_hashes: BTreeSet<DelegationKey>,
}

impl AccessContext {
    /// Resolve the full hierarchy of the authenticated data owner.
    pub async fn from_details(details: &DataOwnerAuthenticationDetails) -> Result<Self> {
        Ok(Self {
            data_owner_type: details.data_owner().map(|o| o.data_owner_type()),
            hierarchy_ids: details.full_hierarchy_ids().await?,
            access_control_keys_hashes: details.access_control_keys_hashes().clone(),
        })
    }

    /// Build a context from already known parts.
    pub fn new(
        data_owner_type: Option<DataOwnerType>,
        hierarchy_ids: Vec<DataOwnerId>,
        access_control_keys_hashes: BTreeSet<DelegationKey>,
    ) -> Self {
        Self {
            data_owner_type,
            hierarchy_ids,
            access_control_keys_hashes,
        }
    }

    /// The authenticated data owner, if any.
    pub fn data_owner_id(&self) -> Option<&DataOwnerId> {
        self.hierarchy_ids.first()
    }

    pub fn is_patient(&self) -> bool {
        self.data_owner_type == Some(DataOwnerType::Patient)
    }

    pub fn hierarchy_ids(&self) -> &[DataOwnerId] {
        &self.hierarchy_ids
    }

    pub fn access_control_keys_hashes(&self) -> &BTreeSet<DelegationKey> {
        &self.access_control_keys_hashes
    }

    /// Whether `id` is the data owner or one of its ancestors.
    pub fn is_self_or_ancestor(&self, id: &DataOwnerId) -> bool {
        self.hierarchy_ids.contains(id)
    }

    /// Every id or hash the requester can be found under.
    pub fn identities(&self) -> BTreeSet<String> {
        self.hierarchy_ids
            .iter()
            .map(|id| id.to_string())
            .chain(self.access_control_keys_hashes.iter().map(|h| h.to_string()))
            .collect()
    }
}

/// What a requester can reach on one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityAccess {
    /// Canonical keys of delegations the requester can use.
    pub accessible_keys: BTreeSet<DelegationKey>,
    /// Highest level held, `None` for no access.
    pub level: Option<AccessLevel>,
    /// Whether one of the accessible delegations is a root.
    pub holds_root: bool,
    /// Whether the requester holds a legacy delegation.
    pub has_legacy: bool,
}

impl EntityAccess {
    /// Compute the requester's access on an entity.
    pub fn compute(
        metadata: &SecurityMetadata,
        legacy_delegates: &BTreeSet<DataOwnerId>,
        ctx: &AccessContext,
    ) -> std::result::Result<Self, IntegrityError> {
        let mut accessible_keys = BTreeSet::new();

        for hash in &ctx.access_control_keys_hashes {
            if let Some((key, _)) = metadata.get_delegation(hash.as_str())? {
                accessible_keys.insert(key);
            }
        }
        for (key, delegation) in &metadata.secure_delegations {
            let explicit_match = [&delegation.delegator, &delegation.delegate]
                .into_iter()
                .flatten()
                .any(|id| ctx.is_self_or_ancestor(id));
            if explicit_match {
                accessible_keys.insert(key.clone());
            }
        }

        let has_legacy = ctx
            .hierarchy_ids
            .iter()
            .any(|id| legacy_delegates.contains(id));

        let mut level = accessible_keys
            .iter()
            .filter_map(|k| metadata.secure_delegations.get(k))
            .map(|d| d.permissions)
            .max();
        if has_legacy {
            level = Some(AccessLevel::Write);
        }

        let holds_root = accessible_keys
            .iter()
            .filter_map(|k| metadata.secure_delegations.get(k))
            .any(|d| d.is_root());

        Ok(Self {
            accessible_keys,
            level,
            holds_root,
            has_legacy,
        })
    }

    /// Whether the requester can reach the entity at all.
    pub fn has_any(&self) -> bool {
        self.level.is_some()
    }

    /// Whether the requester can use `key` or any of its ancestors.
    pub fn can_access_or_ancestor(&self, metadata: &SecurityMetadata, key: &DelegationKey) -> bool {
        self.accessible_keys.contains(key)
            || metadata
                .ancestors_of(key.as_str())
                .iter()
                .any(|a| self.accessible_keys.contains(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delegation_kernel_core::{hash_secret, SecureDelegation};

    fn explicit(from: &str, to: &str, level: AccessLevel, parents: &[&str]) -> SecureDelegation {
        SecureDelegation::new(Some(from.into()), Some(to.into()), level)
            .with_exchange_data_id(format!("{from}->{to}"))
            .with_parents(parents.iter().map(|p| DelegationKey::new(*p)))
    }

    fn metadata() -> SecurityMetadata {
        let mut md = SecurityMetadata::new();
        md.insert_delegation("root".into(), explicit("doc1", "doc1", AccessLevel::Write, &[]))
            .unwrap();
        md.insert_delegation(
            "to-org".into(),
            explicit("doc1", "org", AccessLevel::Read, &["root"]),
        )
        .unwrap();
        let anon_key = hash_secret(&[9u8; 16]);
        md.insert_delegation(
            anon_key.clone(),
            SecureDelegation::new(None, None, AccessLevel::Read).with_parents([DelegationKey::new("to-org")]),
        )
        .unwrap();
        md
    }

    fn ctx(ids: &[&str], hashes: &[DelegationKey]) -> AccessContext {
        AccessContext::new(
            Some(DataOwnerType::Hcp),
            ids.iter().map(|i| DataOwnerId::new(*i)).collect(),
            hashes.iter().cloned().collect(),
        )
    }

    #[test]
    fn test_owner_has_write() {
        let md = metadata();
        let access = EntityAccess::compute(&md, &BTreeSet::new(), &ctx(&["doc1"], &[])).unwrap();
        assert_eq!(access.level, Some(AccessLevel::Write));
        assert!(access.holds_root);
        assert_eq!(access.accessible_keys.len(), 2);
    }

    #[test]
    fn test_inherited_access_through_parent() {
        let md = metadata();
        let access =
            EntityAccess::compute(&md, &BTreeSet::new(), &ctx(&["assistant", "org"], &[])).unwrap();
        assert_eq!(access.level, Some(AccessLevel::Read));
        assert!(!access.holds_root);
    }

    #[test]
    fn test_anonymous_access_by_hash() {
        let md = metadata();
        let access =
            EntityAccess::compute(&md, &BTreeSet::new(), &ctx(&[], &[hash_secret(&[9u8; 16])])).unwrap();
        assert_eq!(access.level, Some(AccessLevel::Read));
        assert!(access.can_access_or_ancestor(&md, &hash_secret(&[9u8; 16])));
        assert!(!access.can_access_or_ancestor(&md, &"root".into()));
    }

    #[test]
    fn test_ancestor_grants_update_right() {
        let md = metadata();
        let access = EntityAccess::compute(&md, &BTreeSet::new(), &ctx(&["doc1"], &[])).unwrap();
        assert!(access.can_access_or_ancestor(&md, &hash_secret(&[9u8; 16])));
    }

    #[test]
    fn test_legacy_counts_as_write() {
        let md = SecurityMetadata::new();
        let legacy = BTreeSet::from([DataOwnerId::new("old")]);
        let access = EntityAccess::compute(&md, &legacy, &ctx(&["old"], &[])).unwrap();
        assert_eq!(access.level, Some(AccessLevel::Write));
        assert!(access.has_legacy);
        assert!(!access.holds_root);
    }

    #[test]
    fn test_stranger_has_nothing() {
        let md = metadata();
        let access = EntityAccess::compute(&md, &BTreeSet::new(), &ctx(&["stranger"], &[])).unwrap();
        assert!(!access.has_any());
        assert!(access.accessible_keys.is_empty());
    }
}
