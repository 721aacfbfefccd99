//! Secure delegations: one edge of an entity's access graph.
//!
//! A delegation moves encrypted payloads from a delegator to a delegate.
//! Either side may be anonymous, in which case the delegation is reachable
//! only through its key (the hash of an access-control secret).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::IntegrityError;
use crate::types::{Base64String, DataOwnerId, DelegationKey};

/// Access level granted by a delegation.
///
/// Ordered so that `Write > Read`; aggregating levels is a `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessLevel {
    Read,
    Write,
}

impl AccessLevel {
    /// Combine two levels held through different delegations.
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }

    /// Whether this level allows writing.
    pub fn is_write(self) -> bool {
        self == AccessLevel::Write
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::Read => f.write_str("READ"),
            AccessLevel::Write => f.write_str("WRITE"),
        }
    }
}

/// The three ciphertext sets carried by a delegation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CiphertextField {
    SecretIds,
    EncryptionKeys,
    OwningEntityIds,
}

impl CiphertextField {
    /// All fields, in wire order.
    pub const ALL: [CiphertextField; 3] = [
        CiphertextField::SecretIds,
        CiphertextField::EncryptionKeys,
        CiphertextField::OwningEntityIds,
    ];
}

/// A single delegation inside an entity's security metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureDelegation {
    /// Data owner that created the delegation, if not anonymous.
    pub delegator: Option<DataOwnerId>,

    /// Data owner receiving access, if not anonymous.
    pub delegate: Option<DataOwnerId>,

    /// Encrypted ids of the secret foreign keys of the entity.
    #[serde(default)]
    pub secret_ids: BTreeSet<Base64String>,

    /// Encrypted keys for the encrypted part of the entity.
    #[serde(default)]
    pub encryption_keys: BTreeSet<Base64String>,

    /// Encrypted ids of the entities owning this one.
    #[serde(default)]
    pub owning_entity_ids: BTreeSet<Base64String>,

    /// Delegations this one depends on. Empty for root delegations.
    #[serde(default)]
    pub parent_delegations: BTreeSet<DelegationKey>,

    /// Exchange data used to encrypt the payloads.
    ///
    /// Present exactly when both delegator and delegate are explicit.
    pub exchange_data_id: Option<String>,

    /// Access level granted to the delegate.
    pub permissions: AccessLevel,
}

impl SecureDelegation {
    /// Create an empty delegation with the given parties and level.
    pub fn new(
        delegator: Option<DataOwnerId>,
        delegate: Option<DataOwnerId>,
        permissions: AccessLevel,
    ) -> Self {
        Self {
            delegator,
            delegate,
            secret_ids: BTreeSet::new(),
            encryption_keys: BTreeSet::new(),
            owning_entity_ids: BTreeSet::new(),
            parent_delegations: BTreeSet::new(),
            exchange_data_id: None,
            permissions,
        }
    }

    /// Set the exchange data id.
    pub fn with_exchange_data_id(mut self, id: impl Into<String>) -> Self {
        self.exchange_data_id = Some(id.into());
        self
    }

    /// Set the parent delegations.
    pub fn with_parents(mut self, parents: impl IntoIterator<Item = DelegationKey>) -> Self {
        self.parent_delegations = parents.into_iter().collect();
        self
    }

    /// Add encrypted entries to one ciphertext set.
    pub fn with_entries<I, S>(mut self, field: CiphertextField, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Base64String>,
    {
        self.field_mut(field).extend(entries.into_iter().map(Into::into));
        self
    }

    /// Root delegations do not depend on any other delegation.
    pub fn is_root(&self) -> bool {
        self.parent_delegations.is_empty()
    }

    /// Number of explicit parties (0, 1 or 2).
    pub fn explicit_parties(&self) -> usize {
        usize::from(self.delegator.is_some()) + usize::from(self.delegate.is_some())
    }

    /// Whether at least one side of the delegation is anonymous.
    pub fn has_anonymous_side(&self) -> bool {
        self.explicit_parties() < 2
    }

    /// Whether the given id is the explicit delegator or delegate.
    pub fn involves(&self, id: &str) -> bool {
        self.delegator.as_ref().is_some_and(|d| d.as_str() == id)
            || self.delegate.as_ref().is_some_and(|d| d.as_str() == id)
    }

    /// Borrow a ciphertext set.
    pub fn field(&self, field: CiphertextField) -> &BTreeSet<Base64String> {
        match field {
            CiphertextField::SecretIds => &self.secret_ids,
            CiphertextField::EncryptionKeys => &self.encryption_keys,
            CiphertextField::OwningEntityIds => &self.owning_entity_ids,
        }
    }

    /// Mutably borrow a ciphertext set.
    pub fn field_mut(&mut self, field: CiphertextField) -> &mut BTreeSet<Base64String> {
        match field {
            CiphertextField::SecretIds => &mut self.secret_ids,
            CiphertextField::EncryptionKeys => &mut self.encryption_keys,
            CiphertextField::OwningEntityIds => &mut self.owning_entity_ids,
        }
    }

    /// Union the ciphertext sets of `other` into this delegation.
    ///
    /// Nothing is ever removed.
    pub fn union_ciphertexts(&mut self, other: &SecureDelegation) {
        for field in CiphertextField::ALL {
            self.field_mut(field)
                .extend(other.field(field).iter().cloned());
        }
    }

    /// Check the local invariants of a delegation stored under `key`.
    pub fn validate_as(&self, key: &DelegationKey) -> Result<(), IntegrityError> {
        let invalid = |reason: &str| IntegrityError::InvalidDelegation {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let both_explicit = self.explicit_parties() == 2;
        if both_explicit && self.exchange_data_id.is_none() {
            return Err(invalid("explicit delegation without exchange data id"));
        }
        if !both_explicit && self.exchange_data_id.is_some() {
            return Err(invalid("anonymous delegation must not expose exchange data id"));
        }
        if self.is_root() && self.permissions != AccessLevel::Write {
            return Err(invalid("root delegation must grant write access"));
        }
        if self.parent_delegations.contains(key) {
            return Err(invalid("delegation lists itself as parent"));
        }
        Ok(())
    }
}
