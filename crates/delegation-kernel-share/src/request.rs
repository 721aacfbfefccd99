//! Share and metadata update requests.
//!
//! These are the only inbound contract of the kernel. They serialize with
//! camelCase field names; [`ShareOrUpdateRequest`] is tagged by a `type`
//! field (`"share"` or `"update"`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use delegation_kernel_core::{
    AccessControlKey, Base64String, CiphertextField, CoreError, DataOwnerId, DelegationKey,
    EntityId,
};
use delegation_kernel_perms::RequestedPermission;

/// Request to create one new secure delegation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityShareRequest {
    /// Delegator to record in the delegation, `None` for anonymous.
    ///
    /// When set it must be the authenticated data owner or an ancestor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_delegator: Option<DataOwnerId>,

    /// Delegate to record in the delegation, `None` for anonymous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_delegate: Option<DataOwnerId>,

    /// Hex access-control keys (16 bytes each). Their hashes become the
    /// delegation key and its equivalences.
    pub access_control_keys: BTreeSet<String>,

    #[serde(default)]
    pub secret_ids: BTreeSet<Base64String>,

    #[serde(default)]
    pub encryption_keys: BTreeSet<Base64String>,

    #[serde(default)]
    pub owning_entity_ids: BTreeSet<Base64String>,

    /// Exchange data id in clear. Only for fully explicit delegations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_data_id: Option<String>,

    /// Exchange data id encrypted per key-pair fingerprint. Only when
    /// exactly one side is explicit.
    #[serde(default)]
    pub encrypted_exchange_data_id: BTreeMap<String, Base64String>,

    #[serde(default)]
    pub requested_permissions: RequestedPermission,
}

impl EntityShareRequest {
    /// A fully anonymous share request for the given hex keys.
    pub fn new<I, S>(access_control_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            explicit_delegator: None,
            explicit_delegate: None,
            access_control_keys: access_control_keys.into_iter().map(Into::into).collect(),
            secret_ids: BTreeSet::new(),
            encryption_keys: BTreeSet::new(),
            owning_entity_ids: BTreeSet::new(),
            exchange_data_id: None,
            encrypted_exchange_data_id: BTreeMap::new(),
            requested_permissions: RequestedPermission::default(),
        }
    }

    pub fn with_delegator(mut self, id: impl Into<DataOwnerId>) -> Self {
        self.explicit_delegator = Some(id.into());
        self
    }

    pub fn with_delegate(mut self, id: impl Into<DataOwnerId>) -> Self {
        self.explicit_delegate = Some(id.into());
        self
    }

    pub fn with_exchange_data_id(mut self, id: impl Into<String>) -> Self {
        self.exchange_data_id = Some(id.into());
        self
    }

    pub fn with_encrypted_exchange_data_id(
        mut self,
        fingerprint: impl Into<String>,
        encrypted: impl Into<Base64String>,
    ) -> Self {
        self.encrypted_exchange_data_id
            .insert(fingerprint.into(), encrypted.into());
        self
    }

    pub fn with_permission(mut self, requested: RequestedPermission) -> Self {
        self.requested_permissions = requested;
        self
    }

    pub fn with_entries<I, S>(mut self, field: CiphertextField, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Base64String>,
    {
        let target = match field {
            CiphertextField::SecretIds => &mut self.secret_ids,
            CiphertextField::EncryptionKeys => &mut self.encryption_keys,
            CiphertextField::OwningEntityIds => &mut self.owning_entity_ids,
        };
        target.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Number of explicit parties (0, 1 or 2).
    pub fn explicit_parties(&self) -> usize {
        usize::from(self.explicit_delegator.is_some())
            + usize::from(self.explicit_delegate.is_some())
    }

    pub fn is_root(&self) -> bool {
        self.requested_permissions.is_root()
    }

    /// Hash every access-control key, in sorted order.
    ///
    /// The first key is used as the delegation key; the others become
    /// equivalences of it.
    pub fn delegation_keys(&self) -> Result<Vec<DelegationKey>, CoreError> {
        let keys = self
            .access_control_keys
            .iter()
            .map(|k| AccessControlKey::from_hex(k).map(|k| k.delegation_key()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(keys.into_iter().collect())
    }
}

/// Whether an entry is added or removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryUpdateType {
    Create,
    Delete,
}

/// Request to change the ciphertext sets of an existing delegation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySharedMetadataUpdateRequest {
    /// Key, or alias of the key, of the delegation to update.
    pub metadata_access_control_hash: DelegationKey,

    #[serde(default)]
    pub secret_ids: BTreeMap<Base64String, EntryUpdateType>,

    #[serde(default)]
    pub encryption_keys: BTreeMap<Base64String, EntryUpdateType>,

    #[serde(default)]
    pub owning_entity_ids: BTreeMap<Base64String, EntryUpdateType>,
}

impl EntitySharedMetadataUpdateRequest {
    pub fn new(metadata_access_control_hash: impl Into<DelegationKey>) -> Self {
        Self {
            metadata_access_control_hash: metadata_access_control_hash.into(),
            secret_ids: BTreeMap::new(),
            encryption_keys: BTreeMap::new(),
            owning_entity_ids: BTreeMap::new(),
        }
    }

    pub fn with_update(
        mut self,
        field: CiphertextField,
        entry: impl Into<Base64String>,
        update: EntryUpdateType,
    ) -> Self {
        let target = match field {
            CiphertextField::SecretIds => &mut self.secret_ids,
            CiphertextField::EncryptionKeys => &mut self.encryption_keys,
            CiphertextField::OwningEntityIds => &mut self.owning_entity_ids,
        };
        target.insert(entry.into(), update);
        self
    }

    /// Updates for one ciphertext set.
    pub fn updates(&self, field: CiphertextField) -> &BTreeMap<Base64String, EntryUpdateType> {
        match field {
            CiphertextField::SecretIds => &self.secret_ids,
            CiphertextField::EncryptionKeys => &self.encryption_keys,
            CiphertextField::OwningEntityIds => &self.owning_entity_ids,
        }
    }

    /// True if the request changes nothing.
    pub fn is_noop(&self) -> bool {
        self.secret_ids.is_empty() && self.encryption_keys.is_empty() && self.owning_entity_ids.is_empty()
    }
}

/// One request of a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShareOrUpdateRequest {
    Share(EntityShareRequest),
    Update(EntitySharedMetadataUpdateRequest),
}

impl From<EntityShareRequest> for ShareOrUpdateRequest {
    fn from(request: EntityShareRequest) -> Self {
        ShareOrUpdateRequest::Share(request)
    }
}

impl From<EntitySharedMetadataUpdateRequest> for ShareOrUpdateRequest {
    fn from(request: EntitySharedMetadataUpdateRequest) -> Self {
        ShareOrUpdateRequest::Update(request)
    }
}

/// Requests for one entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareEntityRequestDetails {
    /// Requests by request id.
    pub requests: BTreeMap<String, ShareOrUpdateRequest>,

    /// Delegations that may become parents of new non-root delegations.
    #[serde(default)]
    pub potential_parent_delegations: BTreeSet<DelegationKey>,
}

impl ShareEntityRequestDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(
        mut self,
        request_id: impl Into<String>,
        request: impl Into<ShareOrUpdateRequest>,
    ) -> Self {
        self.requests.insert(request_id.into(), request.into());
        self
    }

    pub fn with_potential_parents(
        mut self,
        parents: impl IntoIterator<Item = DelegationKey>,
    ) -> Self {
        self.potential_parent_delegations.extend(parents);
        self
    }

    /// Share requests in request id order.
    pub fn share_requests(&self) -> impl Iterator<Item = (&String, &EntityShareRequest)> {
        self.requests.iter().filter_map(|(id, r)| match r {
            ShareOrUpdateRequest::Share(s) => Some((id, s)),
            ShareOrUpdateRequest::Update(_) => None,
        })
    }

    /// Update requests in request id order.
    pub fn update_requests(
        &self,
    ) -> impl Iterator<Item = (&String, &EntitySharedMetadataUpdateRequest)> {
        self.requests.iter().filter_map(|(id, r)| match r {
            ShareOrUpdateRequest::Update(u) => Some((id, u)),
            ShareOrUpdateRequest::Share(_) => None,
        })
    }
}

/// A whole batch, by entity id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkShareOrUpdateMetadataParams {
    pub requests_by_entity_id: BTreeMap<EntityId, ShareEntityRequestDetails>,
}

impl BulkShareOrUpdateMetadataParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(
        mut self,
        entity_id: impl Into<EntityId>,
        details: ShareEntityRequestDetails,
    ) -> Self {
        self.requests_by_entity_id.insert(entity_id.into(), details);
        self
    }
}
