//! Entities carrying security metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::metadata::SecurityMetadata;
use crate::types::{DataOwnerId, EntityId, Revision};

/// A stored entity as seen by the delegation kernel.
///
/// Only the parts relevant to access control are modelled; the clinical
/// content and its encrypted part live elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuredEntity {
    pub id: EntityId,

    /// Revision of the stored copy, `None` before the first save.
    pub rev: Option<Revision>,

    #[serde(default)]
    pub security_metadata: SecurityMetadata,

    /// Data owners holding a legacy-format delegation.
    ///
    /// They count as write holders when deciding permissions.
    #[serde(default)]
    pub legacy_delegates: BTreeSet<DataOwnerId>,
}

impl SecuredEntity {
    /// A new, never saved entity with empty metadata.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            security_metadata: SecurityMetadata::new(),
            legacy_delegates: BTreeSet::new(),
        }
    }

    pub fn with_legacy_delegates(
        mut self,
        delegates: impl IntoIterator<Item = DataOwnerId>,
    ) -> Self {
        self.legacy_delegates = delegates.into_iter().collect();
        self
    }

    pub fn with_metadata(mut self, metadata: SecurityMetadata) -> Self {
        self.security_metadata = metadata;
        self
    }

    /// Whether the entity grants nothing to anybody yet.
    pub fn has_no_access_holders(&self) -> bool {
        self.security_metadata.is_empty() && self.legacy_delegates.is_empty()
    }
}
