//! Test fixtures and helpers.
//!
//! Common setup code for unit and integration tests.

use bytes::Bytes;
use rand::RngCore;
use std::sync::Arc;

use delegation_kernel_core::access_key::ACCESS_CONTROL_KEY_LEN;
use delegation_kernel_core::{hash_secret, DataOwnerId};
use delegation_kernel_perms::{
    AccessContext, DataOwnerAuthenticationDetails, DataOwnerLookup, DataOwnerRecord,
    DataOwnerType, InMemoryDataOwnerDirectory, LazyDataOwner,
};

/// A raw access-control secret.
pub type Secret = [u8; ACCESS_CONTROL_KEY_LEN];

/// Hex form of a secret made of one repeated byte.
pub fn hex_key(byte: u8) -> String {
    format!("{:02x}", byte).repeat(ACCESS_CONTROL_KEY_LEN)
}

/// A fresh random secret.
pub fn random_secret() -> Secret {
    let mut secret = [0u8; ACCESS_CONTROL_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// Access context of a data owner with no parents.
pub fn context_for(id: &str, data_owner_type: DataOwnerType, secrets: &[Secret]) -> AccessContext {
    AccessContext::new(
        Some(data_owner_type),
        vec![DataOwnerId::new(id)],
        secrets.iter().map(|s| hash_secret(s)).collect(),
    )
}

/// Access context of a caller known only by its secrets.
pub fn anonymous_context(secrets: &[Secret]) -> AccessContext {
    AccessContext::new(None, Vec::new(), secrets.iter().map(|s| hash_secret(s)).collect())
}

/// Authentication details of a caller known only by its secrets.
pub fn anonymous_details(secrets: &[Secret]) -> DataOwnerAuthenticationDetails {
    DataOwnerAuthenticationDetails::anonymous(to_bytes(secrets))
}

fn to_bytes(secrets: &[Secret]) -> Vec<Bytes> {
    secrets.iter().map(|s| Bytes::copy_from_slice(s)).collect()
}

/// A data owner directory for building requesters with hierarchies.
#[derive(Clone, Default)]
pub struct HierarchyFixture {
    pub directory: Arc<InMemoryDataOwnerDirectory>,
}

impl HierarchyFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data owner under an optional parent.
    pub fn with_owner(self, id: &str, data_owner_type: DataOwnerType, parent: Option<&str>) -> Self {
        self.directory
            .insert(DataOwnerRecord::new(id, data_owner_type, parent));
        self
    }

    pub fn lookup(&self) -> Arc<dyn DataOwnerLookup> {
        self.directory.clone()
    }

    /// Authentication details of a registered data owner.
    ///
    /// Panics if the owner was never registered.
    pub async fn details_for(&self, id: &str, secrets: &[Secret]) -> DataOwnerAuthenticationDetails {
        let owner = LazyDataOwner::load(&DataOwnerId::new(id), self.lookup())
            .await
            .unwrap_or_else(|e| panic!("fixture owner {id} not registered: {e}"));
        DataOwnerAuthenticationDetails::new(Some(owner), to_bytes(secrets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_key_shape() {
        let key = hex_key(0x0f);
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_random_secrets_differ() {
        assert_ne!(random_secret(), random_secret());
    }

    #[test]
    fn test_context_hashes_secrets() {
        let ctx = context_for("doc1", DataOwnerType::Hcp, &[[1; 16], [2; 16]]);
        assert_eq!(ctx.data_owner_id().map(|id| id.as_str()), Some("doc1"));
        assert!(ctx.access_control_keys_hashes().contains(&hash_secret(&[1; 16])));
        assert!(anonymous_context(&[[1; 16]]).data_owner_id().is_none());
    }

    #[tokio::test]
    async fn test_hierarchy_fixture() {
        let fixture = HierarchyFixture::new()
            .with_owner("org", DataOwnerType::Hcp, None)
            .with_owner("doc1", DataOwnerType::Hcp, Some("org"));
        let details = fixture.details_for("doc1", &[]).await;
        let ids = details.full_hierarchy_ids().await.unwrap();
        assert_eq!(ids, vec![DataOwnerId::new("doc1"), DataOwnerId::new("org")]);
    }
}
