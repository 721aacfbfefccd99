//! Concurrent writers on one entity.
//!
//! `RacingStore` slips a competing share into the backing store right before
//! the kernel's own save of `e1`, so the kernel sees a stale revision and has
//! to read the entity again.

mod common;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;

use delegation_kernel::core::{hash_secret, CiphertextField, Revision};
use delegation_kernel::perms::{DataOwnerType, RequestedPermission};
use delegation_kernel::share::{
    apply_entity_requests, ApplyConfig, BulkShareOrUpdateMetadataParams,
    EntitySharedMetadataUpdateRequest, EntryUpdateType, ShareEntityRequestDetails,
};
use delegation_kernel::store::{EntityStore, MemoryStore, SaveOutcome, StoreExt};
use delegation_kernel::{
    AccessLevel, EntityId, Kernel, KernelConfig, KernelError, RejectionCode, SecuredEntity,
};
use delegation_kernel_testkit::context_for;

use common::{batch, clinic, init_tracing, root_request, share_request};

/// Key bytes used by the competing writer, one per race.
const RACE_KEY_BASE: u8 = 0x40;

/// The only entity that sees competing writes.
const RACED_ENTITY: &str = "e1";

#[derive(Default)]
struct RacingStore {
    inner: MemoryStore,
    /// Saves of the raced entity still to be preceded by a competing write.
    races_left: AtomicU8,
    races_run: AtomicU8,
}

impl RacingStore {
    fn arm(&self, races: u8) {
        self.races_left.store(races, Ordering::SeqCst);
    }

    /// doc1 shares the entity with a new colleague behind the kernel's back.
    async fn race(&self, id: &EntityId) -> delegation_kernel::store::Result<()> {
        let Some(entity) = self.inner.load(id).await? else {
            return Ok(());
        };
        let n = self.races_run.fetch_add(1, Ordering::SeqCst);
        let colleague = format!("colleague{n}");
        let details = ShareEntityRequestDetails::new().with_request(
            "race",
            share_request("doc1", &colleague, RACE_KEY_BASE + n, RequestedPermission::FullRead),
        );
        let ctx = context_for("doc1", DataOwnerType::Hcp, &[]);
        let outcome = apply_entity_requests(&entity, &details, &ctx, &ApplyConfig::default())
            .map_err(|e| delegation_kernel::store::StoreError::Serialization(e.to_string()))?;
        self.inner
            .save_strict(&entity.with_metadata(outcome.metadata))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for RacingStore {
    async fn load(&self, id: &EntityId) -> delegation_kernel::store::Result<Option<SecuredEntity>> {
        self.inner.load(id).await
    }

    async fn save(&self, entity: &SecuredEntity) -> delegation_kernel::store::Result<SaveOutcome> {
        let armed = entity.id.as_str() == RACED_ENTITY
            && self
                .races_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if armed {
            self.race(&entity.id).await?;
        }
        self.inner.save(entity).await
    }

    async fn entities_accessible_by(
        &self,
        accessors: &BTreeSet<String>,
        min_level: AccessLevel,
    ) -> delegation_kernel::store::Result<BTreeSet<EntityId>> {
        self.inner.entities_accessible_by(accessors, min_level).await
    }

    async fn accessors_of(
        &self,
        id: &EntityId,
    ) -> delegation_kernel::store::Result<BTreeMap<String, AccessLevel>> {
        self.inner.accessors_of(id).await
    }

    async fn list_entities(&self) -> delegation_kernel::store::Result<Vec<EntityId>> {
        self.inner.list_entities().await
    }
}

/// A kernel over a racing store, with `a0` and `e1` created and rooted by doc1.
async fn rooted_kernel(config: KernelConfig) -> Result<Kernel<RacingStore>> {
    let kernel = Kernel::new(RacingStore::default(), config);
    let doc1 = clinic().details_for("doc1", &[]).await;
    for id in ["a0", RACED_ENTITY] {
        kernel.create_entity(id, []).await?;
        let results = kernel
            .bulk_share_or_update_metadata(&batch(id, "root", root_request("doc1", 0xaa)), &doc1)
            .await?;
        anyhow::ensure!(results[0].is_success(), "root rejected: {:?}", results[0].rejected_requests);
    }
    Ok(kernel)
}

fn update_root(entry: &str, update: EntryUpdateType) -> BulkShareOrUpdateMetadataParams {
    BulkShareOrUpdateMetadataParams::new().with_entity(
        RACED_ENTITY,
        ShareEntityRequestDetails::new().with_request(
            "u",
            EntitySharedMetadataUpdateRequest::new(hash_secret(&[0xaa; 16])).with_update(
                CiphertextField::SecretIds,
                entry,
                update,
            ),
        ),
    )
}

#[tokio::test]
async fn conflicting_shares_both_land() -> Result<()> {
    init_tracing();
    let kernel = rooted_kernel(KernelConfig::default()).await?;
    let doc1 = clinic().details_for("doc1", &[]).await;

    kernel.store().arm(1);
    let share = share_request("doc1", "nurse", 0x01, RequestedPermission::FullRead);
    let results = kernel
        .bulk_share_or_update_metadata(&batch(RACED_ENTITY, "r1", share), &doc1)
        .await?;

    // First read at rev 2, competing write made rev 3, second read saves rev 4.
    assert_eq!(results[0].entity_rev, Some(Revision(3)));
    let saved = results[0].updated_entity.as_ref().context("share not saved")?;
    assert_eq!(saved.rev, Some(Revision(4)));

    let delegations = &saved.security_metadata.secure_delegations;
    assert!(delegations.contains_key(&hash_secret(&[0x01; 16])));
    assert!(delegations.contains_key(&hash_secret(&[RACE_KEY_BASE; 16])));
    assert!(saved.security_metadata.validate().is_ok());

    let accessors = kernel.accessors_of(&EntityId::new(RACED_ENTITY)).await?;
    assert_eq!(accessors.get("nurse"), Some(&AccessLevel::Read));
    assert_eq!(accessors.get("colleague0"), Some(&AccessLevel::Read));
    Ok(())
}

#[tokio::test]
async fn deleted_entry_stays_deleted_after_a_conflict() -> Result<()> {
    init_tracing();
    let kernel = rooted_kernel(KernelConfig::default()).await?;
    let doc1 = clinic().details_for("doc1", &[]).await;

    let results = kernel
        .bulk_share_or_update_metadata(&update_root("s1", EntryUpdateType::Create), &doc1)
        .await?;
    assert!(results[0].is_success(), "{:?}", results[0].rejected_requests);

    kernel.store().arm(1);
    let results = kernel
        .bulk_share_or_update_metadata(&update_root("s1", EntryUpdateType::Delete), &doc1)
        .await?;
    assert!(results[0].rejected_requests.is_empty(), "{:?}", results[0].rejected_requests);
    let saved = results[0].updated_entity.as_ref().context("delete not saved")?;

    let root = &saved.security_metadata.secure_delegations[&hash_secret(&[0xaa; 16])];
    assert!(!root.secret_ids.contains("s1"));
    assert!(saved
        .security_metadata
        .secure_delegations
        .contains_key(&hash_secret(&[RACE_KEY_BASE; 16])));

    let stored = kernel
        .load(&EntityId::new(RACED_ENTITY))
        .await?
        .context("entity missing")?;
    assert_eq!(&stored, saved);
    Ok(())
}

#[tokio::test]
async fn endless_conflicts_reject_only_the_raced_entity() -> Result<()> {
    init_tracing();
    let config = KernelConfig {
        max_conflict_retries: 2,
        ..KernelConfig::default()
    };
    let kernel = rooted_kernel(config).await?;
    let doc1 = clinic().details_for("doc1", &[]).await;

    kernel.store().arm(u8::MAX);
    let params = batch("a0", "r0", share_request("doc1", "nurse", 0x01, RequestedPermission::FullRead))
        .with_entity(
            RACED_ENTITY,
            ShareEntityRequestDetails::new()
                .with_request("r1", share_request("doc1", "nurse", 0x01, RequestedPermission::FullRead))
                .with_request("r2", share_request("doc1", "doc2", 0x02, RequestedPermission::FullWrite)),
        );
    let results = kernel.bulk_share_or_update_metadata(&params, &doc1).await?;
    assert_eq!(results.len(), 2);

    let a0 = &results[0];
    assert_eq!(a0.entity_id, EntityId::new("a0"));
    assert_eq!(a0.updated_entity.as_ref().and_then(|e| e.rev), Some(Revision(3)));

    let e1 = &results[1];
    assert!(e1.updated_entity.is_none());
    assert_eq!(e1.rejected_requests.len(), 2);
    for rejection in e1.rejected_requests.values() {
        assert_eq!(rejection.code, RejectionCode::Conflict);
        assert!(rejection.should_retry);
    }

    // One race per attempt, and only the competing writes landed.
    assert_eq!(kernel.store().races_run.load(Ordering::SeqCst), 3);
    let stored = kernel
        .load(&EntityId::new(RACED_ENTITY))
        .await?
        .context("entity missing")?;
    assert!(!stored
        .security_metadata
        .secure_delegations
        .contains_key(&hash_secret(&[0x01; 16])));
    Ok(())
}

#[tokio::test]
async fn duplicate_merge_gives_up_under_endless_conflicts() -> Result<()> {
    init_tracing();
    let config = KernelConfig {
        max_conflict_retries: 1,
        ..KernelConfig::default()
    };
    let kernel = rooted_kernel(config).await?;

    kernel.store().arm(u8::MAX);
    let err = kernel
        .merge_duplicate_entities(&EntityId::new(RACED_ENTITY), &EntityId::new("a0"))
        .await
        .expect_err("every save races");
    assert!(matches!(
        err,
        KernelError::ConflictRetriesExhausted { attempts: 2, .. }
    ));
    assert!(!err.is_fatal());
    Ok(())
}
