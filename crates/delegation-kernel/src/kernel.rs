//! The Kernel: unified API for the delegation system.
//!
//! The Kernel ties the request applier to an entity store. For every entity
//! of a batch it reads the stored snapshot, computes the next metadata,
//! and writes it back with a revision check. When another writer got there
//! first, the entity is read again and the requests are applied to the
//! fresh version.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use delegation_kernel_core::{AccessLevel, DataOwnerId, EntityId, SecuredEntity};
use delegation_kernel_merge::merge_duplicated_into;
use delegation_kernel_perms::{AccessContext, DataOwnerAuthenticationDetails, EntityAccess};
use delegation_kernel_share::{
    apply_entity_requests, validate_bulk_params, ApplyConfig, BulkShareOrUpdateMetadataParams,
    EntityBulkShareResult, RejectedRequest, ShareEntityRequestDetails,
};
use delegation_kernel_store::{EntityStore, SaveOutcome, StoreError, StoreExt};

use crate::error::{KernelError, Result};

/// Configuration for the Kernel.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// How many times a conflicting save is retried on a fresh read.
    pub max_conflict_retries: u32,
    /// Check every graph invariant before writing.
    pub validate_metadata_on_save: bool,
    /// Request application settings.
    pub apply: ApplyConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            validate_metadata_on_save: true,
            apply: ApplyConfig::default(),
        }
    }
}

/// The main Kernel struct.
///
/// Provides a unified API for:
/// - Creating entities
/// - Sharing entities and updating shared metadata in bulk
/// - Querying what a requester can reach
/// - Merging duplicate entities
pub struct Kernel<S: EntityStore> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: KernelConfig,
}

impl<S: EntityStore> Kernel<S> {
    /// Create a new kernel instance.
    pub fn new(store: S, config: KernelConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an entity with empty metadata.
    ///
    /// `legacy_delegates` hold write access from a legacy delegation.
    pub async fn create_entity(
        &self,
        id: impl Into<EntityId>,
        legacy_delegates: impl IntoIterator<Item = DataOwnerId>,
    ) -> Result<SecuredEntity> {
        let entity = SecuredEntity::new(id).with_legacy_delegates(legacy_delegates);
        match self.store.save_strict(&entity).await {
            Ok(saved) => {
                debug!(entity = %saved.id, "created entity");
                Ok(saved)
            }
            Err(StoreError::Conflict { entity_id, .. }) => Err(KernelError::EntityExists(entity_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Get an entity by id.
    pub async fn load(&self, id: &EntityId) -> Result<Option<SecuredEntity>> {
        Ok(self.store.load(id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a batch of share and update requests.
    ///
    /// The batch is validated as a whole first; a structural problem fails
    /// everything before any entity is read. Then each entity is handled on
    /// its own and gets one result, in entity id order. Rejected requests
    /// never fail the call.
    pub async fn bulk_share_or_update_metadata(
        &self,
        params: &BulkShareOrUpdateMetadataParams,
        details: &DataOwnerAuthenticationDetails,
    ) -> Result<Vec<EntityBulkShareResult>> {
        validate_bulk_params(params)?;
        let ctx = AccessContext::from_details(details).await?;

        let mut results = Vec::with_capacity(params.requests_by_entity_id.len());
        for (entity_id, requests) in &params.requests_by_entity_id {
            results.push(self.share_entity(entity_id, requests, &ctx).await?);
        }
        Ok(results)
    }

    /// Read, apply, save with a revision check.
    ///
    /// A conflicting save reads the entity again and applies the requests to
    /// the fresh version, so permissions and entry updates are always checked
    /// against what is actually stored. When every attempt conflicts, each
    /// applied request is rejected with a retryable 409.
    async fn share_entity(
        &self,
        entity_id: &EntityId,
        requests: &ShareEntityRequestDetails,
        ctx: &AccessContext,
    ) -> Result<EntityBulkShareResult> {
        let mut attempts = 0u32;
        loop {
            let Some(entity) = self.store.load(entity_id).await? else {
                let rejected = requests
                    .requests
                    .keys()
                    .map(|id| {
                        (
                            id.clone(),
                            RejectedRequest::not_found(false, format!("entity {} not found", entity_id)),
                        )
                    })
                    .collect();
                return Ok(EntityBulkShareResult::rejected(entity_id.clone(), None, rejected));
            };

            let outcome = apply_entity_requests(&entity, requests, ctx, &self.config.apply)?;
            if !outcome.changed() {
                return Ok(EntityBulkShareResult::rejected(
                    entity_id.clone(),
                    entity.rev,
                    outcome.rejected,
                ));
            }

            let entity_rev = entity.rev;
            let candidate = entity.with_metadata(outcome.metadata);
            self.check_before_save(&candidate)?;

            attempts += 1;
            let current = match self.store.save(&candidate).await? {
                SaveOutcome::Saved(saved) => {
                    debug!(entity = %saved.id, rev = ?saved.rev, attempts, "saved entity");
                    return Ok(EntityBulkShareResult {
                        updated_entity: Some(saved),
                        entity_id: entity_id.clone(),
                        entity_rev,
                        rejected_requests: outcome.rejected,
                    });
                }
                SaveOutcome::Conflict { current } => current,
            };

            if attempts > self.config.max_conflict_retries {
                warn!(entity = %entity_id, attempts, "giving up after repeated conflicts");
                let mut rejected = outcome.rejected;
                for request_id in outcome.applied {
                    rejected.insert(
                        request_id,
                        RejectedRequest::conflict(format!(
                            "entity {} kept changing, {} save attempts failed",
                            entity_id, attempts
                        )),
                    );
                }
                return Ok(EntityBulkShareResult::rejected(entity_id.clone(), entity_rev, rejected));
            }
            info!(
                entity = %entity_id,
                expected = ?entity_rev,
                found = ?current.and_then(|c| c.rev),
                "write conflict, applying requests to the stored version"
            );
        }
    }

    fn check_before_save(&self, entity: &SecuredEntity) -> Result<()> {
        if self.config.validate_metadata_on_save {
            if let Err(e) = entity.security_metadata.validate() {
                warn!(entity = %entity.id, error = %e, "refusing to save invalid metadata");
                return Err(e.into());
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The requester's level on one entity, `None` for no access.
    pub async fn access_level(
        &self,
        id: &EntityId,
        details: &DataOwnerAuthenticationDetails,
    ) -> Result<Option<AccessLevel>> {
        let entity = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| KernelError::EntityNotFound(id.clone()))?;
        let ctx = AccessContext::from_details(details).await?;
        let access = EntityAccess::compute(&entity.security_metadata, &entity.legacy_delegates, &ctx)?;
        Ok(access.level)
    }

    /// Entities the requester reaches with at least `min_level`, through
    /// its hierarchy or its access-control secrets.
    ///
    /// Served from the accessor index, so legacy delegations are not seen.
    pub async fn accessible_entities(
        &self,
        details: &DataOwnerAuthenticationDetails,
        min_level: AccessLevel,
    ) -> Result<BTreeSet<EntityId>> {
        let ctx = AccessContext::from_details(details).await?;
        Ok(self
            .store
            .entities_accessible_by(&ctx.identities(), min_level)
            .await?)
    }

    /// Accessors of an entity as recorded in the store index.
    pub async fn accessors_of(&self, id: &EntityId) -> Result<BTreeMap<String, AccessLevel>> {
        Ok(self.store.accessors_of(id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Duplicates
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge the metadata of entity `from` into entity `into`.
    ///
    /// For two entities standing for the same subject. `from` is left as is;
    /// legacy delegates of both are kept on `into`. A conflicting save reads
    /// both entities again and redoes the merge.
    pub async fn merge_duplicate_entities(&self, into: &EntityId, from: &EntityId) -> Result<SecuredEntity> {
        let mut attempts = 0u32;
        loop {
            let target = self
                .store
                .load(into)
                .await?
                .ok_or_else(|| KernelError::EntityNotFound(into.clone()))?;
            let source = self
                .store
                .load(from)
                .await?
                .ok_or_else(|| KernelError::EntityNotFound(from.clone()))?;

            let metadata = merge_duplicated_into(&target.security_metadata, &source.security_metadata)?;
            let mut candidate = target.with_metadata(metadata);
            candidate
                .legacy_delegates
                .extend(source.legacy_delegates.iter().cloned());
            self.check_before_save(&candidate)?;

            attempts += 1;
            match self.store.save(&candidate).await? {
                SaveOutcome::Saved(saved) => {
                    info!(into = %into, from = %from, attempts, "merged duplicate entities");
                    return Ok(saved);
                }
                SaveOutcome::Conflict { .. } if attempts > self.config.max_conflict_retries => {
                    warn!(entity = %into, attempts, "giving up after repeated conflicts");
                    return Err(KernelError::ConflictRetriesExhausted {
                        entity_id: into.clone(),
                        attempts,
                    });
                }
                SaveOutcome::Conflict { .. } => {
                    info!(entity = %into, "write conflict, merging duplicates again");
                }
            }
        }
    }
}
