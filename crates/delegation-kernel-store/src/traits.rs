//! Entity store trait: the persistence collaborator of the kernel.
//!
//! The kernel never holds entities across requests. It loads a snapshot,
//! computes the next metadata and writes it back with a revision check.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use delegation_kernel_core::{AccessLevel, EntityId, SecuredEntity};

use crate::error::{Result, StoreError};

/// Result of a conditional save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The entity was written; carries the stored copy with its new revision.
    Saved(SecuredEntity),
    /// The stored revision differs from the one the entity was read at.
    Conflict {
        /// What is stored now, `None` if the entity does not exist.
        current: Option<SecuredEntity>,
    },
}

/// The EntityStore trait: async interface for entity persistence.
///
/// # Design Notes
///
/// - **Compare-and-swap**: `save` succeeds only if the stored revision equals
///   `entity.rev`. A `None` revision means the entity must not exist yet.
/// - **Accessor index**: every successful save replaces the entity's index
///   entries with those derived from
///   [`SecurityMetadata::resolve_accessors`](delegation_kernel_core::SecurityMetadata::resolve_accessors),
///   within the same write.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Get an entity by id.
    async fn load(&self, id: &EntityId) -> Result<Option<SecuredEntity>>;

    /// Write an entity if its revision still matches the stored one.
    ///
    /// The saved copy gets the next revision ([`Revision::FIRST`] on creation).
    ///
    /// [`Revision::FIRST`]: delegation_kernel_core::Revision::FIRST
    async fn save(&self, entity: &SecuredEntity) -> Result<SaveOutcome>;

    /// Ids of entities where any of `accessors` holds at least `min_level`.
    ///
    /// Accessors are data owner ids or delegation key hashes.
    async fn entities_accessible_by(
        &self,
        accessors: &BTreeSet<String>,
        min_level: AccessLevel,
    ) -> Result<BTreeSet<EntityId>>;

    /// Index entries of one entity.
    async fn accessors_of(&self, id: &EntityId) -> Result<BTreeMap<String, AccessLevel>>;

    /// All entity ids, in order.
    async fn list_entities(&self) -> Result<Vec<EntityId>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: EntityStore {
    /// Load several entities, in the order given.
    fn load_many(
        &self,
        ids: &[EntityId],
    ) -> impl std::future::Future<Output = Result<Vec<Option<SecuredEntity>>>> + Send;

    /// Save, turning a revision conflict into [`StoreError::Conflict`].
    fn save_strict(
        &self,
        entity: &SecuredEntity,
    ) -> impl std::future::Future<Output = Result<SecuredEntity>> + Send;
}

impl<S: EntityStore + ?Sized> StoreExt for S {
    async fn load_many(&self, ids: &[EntityId]) -> Result<Vec<Option<SecuredEntity>>> {
        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            entities.push(self.load(id).await?);
        }
        Ok(entities)
    }

    async fn save_strict(&self, entity: &SecuredEntity) -> Result<SecuredEntity> {
        match self.save(entity).await? {
            SaveOutcome::Saved(saved) => Ok(saved),
            SaveOutcome::Conflict { current } => Err(StoreError::Conflict {
                entity_id: entity.id.clone(),
                expected: entity.rev,
                actual: current.and_then(|c| c.rev),
            }),
        }
    }
}
