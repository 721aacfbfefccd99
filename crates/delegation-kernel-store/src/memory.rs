//! In-memory implementation of the EntityStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use delegation_kernel_core::{AccessLevel, EntityId, Revision, SecuredEntity};

use crate::error::{Result, StoreError};
use crate::index::index_entries;
use crate::traits::{EntityStore, SaveOutcome};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Entities indexed by id.
    entities: BTreeMap<EntityId, SecuredEntity>,

    /// Accessor -> entity -> level.
    accessors: BTreeMap<String, BTreeMap<EntityId, AccessLevel>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn load(&self, id: &EntityId) -> Result<Option<SecuredEntity>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.entities.get(id).cloned())
    }

    async fn save(&self, entity: &SecuredEntity) -> Result<SaveOutcome> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        let current = inner.entities.get(&entity.id);
        if current.and_then(|c| c.rev) != entity.rev {
            return Ok(SaveOutcome::Conflict {
                current: current.cloned(),
            });
        }

        let entries = index_entries(&entity.security_metadata)?;
        let mut saved = entity.clone();
        saved.rev = Some(entity.rev.map_or(Revision::FIRST, Revision::next));

        for entities in inner.accessors.values_mut() {
            entities.remove(&entity.id);
        }
        inner.accessors.retain(|_, entities| !entities.is_empty());
        for (accessor, level) in entries {
            inner
                .accessors
                .entry(accessor)
                .or_default()
                .insert(entity.id.clone(), level);
        }
        inner.entities.insert(entity.id.clone(), saved.clone());

        debug!(entity = %entity.id, rev = ?saved.rev, "saved entity");
        Ok(SaveOutcome::Saved(saved))
    }

    async fn entities_accessible_by(
        &self,
        accessors: &BTreeSet<String>,
        min_level: AccessLevel,
    ) -> Result<BTreeSet<EntityId>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(accessors
            .iter()
            .filter_map(|a| inner.accessors.get(a))
            .flat_map(|entities| entities.iter())
            .filter(|(_, level)| **level >= min_level)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn accessors_of(&self, id: &EntityId) -> Result<BTreeMap<String, AccessLevel>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .accessors
            .iter()
            .filter_map(|(accessor, entities)| entities.get(id).map(|l| (accessor.clone(), *l)))
            .collect())
    }

    async fn list_entities(&self) -> Result<Vec<EntityId>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.entities.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use delegation_kernel_core::{hash_secret, SecureDelegation, SecurityMetadata};

    fn shared_with(owner: &str, secret: u8) -> SecurityMetadata {
        let mut md = SecurityMetadata::new();
        md.insert_delegation(
            hash_secret(&[secret; 16]),
            SecureDelegation::new(None, Some(owner.into()), AccessLevel::Write),
        )
        .unwrap();
        md
    }

    #[tokio::test]
    async fn test_create_then_update() {
        let store = MemoryStore::new();
        let saved = store.save_strict(&SecuredEntity::new("e1")).await.unwrap();
        assert_eq!(saved.rev, Some(Revision::FIRST));

        let updated = saved.with_metadata(shared_with("doc1", 1));
        let saved = store.save_strict(&updated).await.unwrap();
        assert_eq!(saved.rev, Some(Revision(2)));
        assert_eq!(store.load(&"e1".into()).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let store = MemoryStore::new();
        let first = store.save_strict(&SecuredEntity::new("e1")).await.unwrap();
        store.save_strict(&first).await.unwrap();

        match store.save(&first).await.unwrap() {
            SaveOutcome::Conflict { current } => {
                assert_eq!(current.and_then(|c| c.rev), Some(Revision(2)));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert!(matches!(
            store.save_strict(&SecuredEntity::new("e1")).await,
            Err(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_index_follows_saves() {
        let store = MemoryStore::new();
        let e1 = store
            .save_strict(&SecuredEntity::new("e1").with_metadata(shared_with("doc1", 1)))
            .await
            .unwrap();
        store
            .save_strict(&SecuredEntity::new("e2").with_metadata(shared_with("doc2", 2)))
            .await
            .unwrap();

        let doc1 = BTreeSet::from(["doc1".to_string()]);
        let found = store.entities_accessible_by(&doc1, AccessLevel::Read).await.unwrap();
        assert_eq!(found, BTreeSet::from([EntityId::new("e1")]));

        // Replacing the metadata drops the old entries.
        store.save_strict(&e1.with_metadata(shared_with("doc2", 3))).await.unwrap();
        assert!(store.entities_accessible_by(&doc1, AccessLevel::Read).await.unwrap().is_empty());

        let by_hash = BTreeSet::from([hash_secret(&[3; 16]).into_inner()]);
        let found = store.entities_accessible_by(&by_hash, AccessLevel::Write).await.unwrap();
        assert_eq!(found, BTreeSet::from([EntityId::new("e1")]));
    }

    #[tokio::test]
    async fn test_load_many_keeps_order() {
        let store = MemoryStore::new();
        store.save_strict(&SecuredEntity::new("b")).await.unwrap();
        let ids = vec![EntityId::new("b"), EntityId::new("missing")];
        let loaded = store.load_many(&ids).await.unwrap();
        assert!(loaded[0].is_some());
        assert!(loaded[1].is_none());
        assert_eq!(store.list_entities().await.unwrap(), vec![EntityId::new("b")]);
    }
}
