//! Data owner authentication details.
//!
//! Describes who is asking: an optional data owner (with a lazily resolved
//! parent chain) plus the access-control secrets presented with the request.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use delegation_kernel_core::{digests_equal, resolve_hashes, DataOwnerId, DelegationKey};

use crate::error::{PermsError, Result};

/// Kind of data owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataOwnerType {
    Hcp,
    Patient,
    Device,
}

/// A data owner with a link to its parent.
///
/// `parent` may need an external lookup; implementations should memoize it.
#[async_trait]
pub trait DataOwnerDetails: Send + Sync + fmt::Debug {
    fn id(&self) -> &DataOwnerId;

    fn data_owner_type(&self) -> DataOwnerType;

    /// The parent data owner, if any.
    async fn parent(&self) -> Result<Option<Arc<dyn DataOwnerDetails>>>;
}

/// The authenticated principal of one request.
///
/// Built once per request and never mutated.
#[derive(Clone)]
pub struct DataOwnerAuthenticationDetails {
    data_owner: Option<Arc<dyn DataOwnerDetails>>,
    access_control_keys: Vec<Bytes>,
    access_control_keys_hashes: BTreeSet<DelegationKey>,
}

impl DataOwnerAuthenticationDetails {
    /// Create details, hashing every presented secret.
    pub fn new(data_owner: Option<Arc<dyn DataOwnerDetails>>, access_control_keys: Vec<Bytes>) -> Self {
        let access_control_keys_hashes = resolve_hashes(access_control_keys.iter());
        Self {
            data_owner,
            access_control_keys,
            access_control_keys_hashes,
        }
    }

    /// Details of a caller holding only access-control secrets.
    pub fn anonymous(access_control_keys: Vec<Bytes>) -> Self {
        Self::new(None, access_control_keys)
    }

    pub fn data_owner(&self) -> Option<&Arc<dyn DataOwnerDetails>> {
        self.data_owner.as_ref()
    }

    pub fn access_control_keys(&self) -> &[Bytes] {
        &self.access_control_keys
    }

    pub fn access_control_keys_hashes(&self) -> &BTreeSet<DelegationKey> {
        &self.access_control_keys_hashes
    }

    /// True if `id_or_hash` is the data owner itself or one of the hashes.
    ///
    /// Does not look at the hierarchy.
    pub fn is_data_owner_or_has_access_key_to(&self, id_or_hash: &str) -> bool {
        if let Some(owner) = &self.data_owner {
            if owner.id().as_str() == id_or_hash {
                return true;
            }
        }
        self.has_access_key_hash(id_or_hash)
    }

    /// Like [`Self::is_data_owner_or_has_access_key_to`], also matching any
    /// ancestor of the data owner. Stops at the first match.
    pub async fn is_data_owner_or_child_or_has_access_key_to(&self, id_or_hash: &str) -> Result<bool> {
        if self.is_data_owner_or_has_access_key_to(id_or_hash) {
            return Ok(true);
        }
        let Some(owner) = &self.data_owner else {
            return Ok(false);
        };

        let mut seen = BTreeSet::from([owner.id().clone()]);
        let mut current = owner.parent().await?;
        while let Some(ancestor) = current {
            if ancestor.id().as_str() == id_or_hash {
                return Ok(true);
            }
            if !seen.insert(ancestor.id().clone()) {
                return Err(PermsError::HierarchyCycle(ancestor.id().to_string()));
            }
            current = ancestor.parent().await?;
        }
        Ok(false)
    }

    /// The data owner id followed by the ids of all its ancestors.
    ///
    /// Empty for anonymous callers.
    pub async fn full_hierarchy_ids(&self) -> Result<Vec<DataOwnerId>> {
        let Some(owner) = &self.data_owner else {
            return Ok(Vec::new());
        };

        let mut ids = vec![owner.id().clone()];
        let mut current = owner.parent().await?;
        while let Some(ancestor) = current {
            if ids.contains(ancestor.id()) {
                return Err(PermsError::HierarchyCycle(ancestor.id().to_string()));
            }
            ids.push(ancestor.id().clone());
            current = ancestor.parent().await?;
        }
        Ok(ids)
    }

    fn has_access_key_hash(&self, candidate: &str) -> bool {
        // Visit every hash so timing does not reveal which one matched.
        self.access_control_keys_hashes
            .iter()
            .fold(false, |found, h| digests_equal(h.as_str(), candidate) | found)
    }
}

impl fmt::Debug for DataOwnerAuthenticationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataOwnerAuthenticationDetails")
            .field("data_owner", &self.data_owner.as_ref().map(|o| o.id()))
            .field("access_control_keys", &self.access_control_keys.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{DataOwnerRecord, InMemoryDataOwnerDirectory, LazyDataOwner};
    use delegation_kernel_core::hash_secret;

    async fn chain() -> (Arc<InMemoryDataOwnerDirectory>, DataOwnerAuthenticationDetails) {
        let dir = Arc::new(InMemoryDataOwnerDirectory::new());
        dir.insert(DataOwnerRecord::new("org", DataOwnerType::Hcp, None));
        dir.insert(DataOwnerRecord::new("dept", DataOwnerType::Hcp, Some("org")));
        dir.insert(DataOwnerRecord::new("doc", DataOwnerType::Hcp, Some("dept")));
        let owner = LazyDataOwner::load(&DataOwnerId::new("doc"), dir.clone())
            .await
            .unwrap();
        let details =
            DataOwnerAuthenticationDetails::new(Some(owner), vec![Bytes::from(vec![7u8; 16])]);
        (dir, details)
    }

    #[tokio::test]
    async fn test_direct_match() {
        let (_, details) = chain().await;
        assert!(details.is_data_owner_or_has_access_key_to("doc"));
        assert!(details.is_data_owner_or_has_access_key_to(hash_secret(&[7u8; 16]).as_str()));
        assert!(!details.is_data_owner_or_has_access_key_to("org"));
    }

    #[tokio::test]
    async fn test_hierarchy_match() {
        let (_, details) = chain().await;
        assert!(details.is_data_owner_or_child_or_has_access_key_to("org").await.unwrap());
        assert!(!details.is_data_owner_or_child_or_has_access_key_to("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_hierarchy_short_circuits() {
        let (dir, details) = chain().await;
        let before = dir.lookup_count();
        assert!(details.is_data_owner_or_child_or_has_access_key_to("dept").await.unwrap());
        // Only the parent of "doc" had to be fetched.
        assert_eq!(dir.lookup_count(), before + 1);
    }

    #[tokio::test]
    async fn test_full_hierarchy_ids() {
        let (_, details) = chain().await;
        let ids = details.full_hierarchy_ids().await.unwrap();
        assert_eq!(
            ids,
            vec![DataOwnerId::new("doc"), DataOwnerId::new("dept"), DataOwnerId::new("org")]
        );
    }

    #[tokio::test]
    async fn test_anonymous_caller() {
        let details = DataOwnerAuthenticationDetails::anonymous(vec![Bytes::from_static(&[1u8; 16])]);
        assert!(details.full_hierarchy_ids().await.unwrap().is_empty());
        assert_eq!(details.access_control_keys_hashes().len(), 1);
        assert!(!details.is_data_owner_or_child_or_has_access_key_to("doc").await.unwrap());
    }

    #[tokio::test]
    async fn test_hierarchy_cycle_is_error() {
        let dir = Arc::new(InMemoryDataOwnerDirectory::new());
        dir.insert(DataOwnerRecord::new("a", DataOwnerType::Hcp, Some("b")));
        dir.insert(DataOwnerRecord::new("b", DataOwnerType::Hcp, Some("a")));
        let owner = LazyDataOwner::load(&DataOwnerId::new("a"), dir).await.unwrap();
        let details = DataOwnerAuthenticationDetails::new(Some(owner), Vec::new());
        assert!(matches!(
            details.full_hierarchy_ids().await,
            Err(PermsError::HierarchyCycle(_))
        ));
        assert!(details
            .is_data_owner_or_child_or_has_access_key_to("zzz")
            .await
            .is_err());
    }
}
