//! Shared setup for the kernel integration tests.

#![allow(dead_code)]

use delegation_kernel::perms::{DataOwnerType, RequestedPermission};
use delegation_kernel::share::{
    BulkShareOrUpdateMetadataParams, EntityShareRequest, ShareEntityRequestDetails,
};
use delegation_kernel::store::MemoryStore;
use delegation_kernel::{Kernel, KernelConfig};
use delegation_kernel_testkit::{hex_key, HierarchyFixture};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn memory_kernel() -> Kernel<MemoryStore> {
    Kernel::new(MemoryStore::new(), KernelConfig::default())
}

/// An organisation with two doctors, plus an unrelated nurse and a patient.
pub fn clinic() -> HierarchyFixture {
    HierarchyFixture::new()
        .with_owner("org", DataOwnerType::Hcp, None)
        .with_owner("doc1", DataOwnerType::Hcp, Some("org"))
        .with_owner("doc2", DataOwnerType::Hcp, Some("org"))
        .with_owner("nurse", DataOwnerType::Hcp, None)
        .with_owner("patient", DataOwnerType::Patient, None)
}

pub fn root_request(owner: &str, key_byte: u8) -> EntityShareRequest {
    EntityShareRequest::new([hex_key(key_byte)])
        .with_delegator(owner)
        .with_delegate(owner)
        .with_exchange_data_id(format!("self-{owner}"))
        .with_permission(RequestedPermission::Root)
}

pub fn share_request(
    delegator: &str,
    delegate: &str,
    key_byte: u8,
    permission: RequestedPermission,
) -> EntityShareRequest {
    EntityShareRequest::new([hex_key(key_byte)])
        .with_delegator(delegator)
        .with_delegate(delegate)
        .with_exchange_data_id(format!("{delegator}-{delegate}"))
        .with_permission(permission)
}

/// A batch with a single request for a single entity.
pub fn batch(
    entity_id: &str,
    request_id: &str,
    request: EntityShareRequest,
) -> BulkShareOrUpdateMetadataParams {
    BulkShareOrUpdateMetadataParams::new().with_entity(
        entity_id,
        ShareEntityRequestDetails::new().with_request(request_id, request),
    )
}
