//! Proptest generators for kernel types.
//!
//! Every metadata strategy here produces graphs that pass
//! [`SecurityMetadata::validate`].

use proptest::prelude::*;
use std::collections::BTreeSet;

use delegation_kernel_core::{
    hash_secret, AccessLevel, CiphertextField, DataOwnerId, DelegationKey, SecureDelegation,
    SecurityMetadata,
};

use crate::fixtures::Secret;

/// Generate an arbitrary access-control secret.
pub fn secret() -> impl Strategy<Value = Secret> {
    any::<Secret>()
}

/// Generate the delegation key of an arbitrary secret.
pub fn delegation_key() -> impl Strategy<Value = DelegationKey> {
    secret().prop_map(|s| hash_secret(&s))
}

/// Generate a data owner id from a small pool, so that ids collide often.
pub fn data_owner_id() -> impl Strategy<Value = DataOwnerId> {
    prop_oneof![
        Just("doc1"),
        Just("doc2"),
        Just("nurse"),
        Just("patient"),
        Just("org"),
    ]
    .prop_map(DataOwnerId::new)
}

pub fn access_level() -> impl Strategy<Value = AccessLevel> {
    prop_oneof![Just(AccessLevel::Read), Just(AccessLevel::Write)]
}

/// Generate a set of opaque ciphertexts.
pub fn ciphertexts(max_len: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[A-Za-z0-9+/]{4,12}", 0..=max_len)
}

/// Parameters for one delegation, before parents are chosen.
#[derive(Debug, Clone)]
pub struct DelegationParams {
    pub delegator: Option<DataOwnerId>,
    pub delegate: Option<DataOwnerId>,
    pub level: AccessLevel,
    pub secret_ids: BTreeSet<String>,
    pub encryption_keys: BTreeSet<String>,
    pub owning_entity_ids: BTreeSet<String>,
    /// Raw picks among the earlier delegations; reduced modulo their count.
    pub parent_picks: Vec<usize>,
}

impl Arbitrary for DelegationParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            proptest::option::of(data_owner_id()),
            proptest::option::of(data_owner_id()),
            access_level(),
            ciphertexts(3),
            ciphertexts(2),
            ciphertexts(2),
            prop::collection::vec(any::<usize>(), 0..3),
        )
            .prop_map(
                |(delegator, delegate, level, secret_ids, encryption_keys, owning_entity_ids, parent_picks)| {
                    DelegationParams {
                        delegator,
                        delegate,
                        level,
                        secret_ids,
                        encryption_keys,
                        owning_entity_ids,
                        parent_picks,
                    }
                },
            )
            .boxed()
    }
}

/// Build a delegation whose parents are picked among `earlier`.
///
/// Parents only point backwards, so the result is acyclic.
pub fn delegation_from_params(
    key: &DelegationKey,
    params: &DelegationParams,
    earlier: &[DelegationKey],
) -> SecureDelegation {
    let parents: BTreeSet<DelegationKey> = if earlier.is_empty() {
        BTreeSet::new()
    } else {
        params
            .parent_picks
            .iter()
            .map(|p| earlier[p % earlier.len()].clone())
            .collect()
    };
    let level = if parents.is_empty() {
        AccessLevel::Write
    } else {
        params.level
    };

    let mut delegation = SecureDelegation::new(params.delegator.clone(), params.delegate.clone(), level)
        .with_parents(parents)
        .with_entries(CiphertextField::SecretIds, params.secret_ids.iter().cloned())
        .with_entries(CiphertextField::EncryptionKeys, params.encryption_keys.iter().cloned())
        .with_entries(CiphertextField::OwningEntityIds, params.owning_entity_ids.iter().cloned());
    if delegation.explicit_parties() == 2 {
        delegation = delegation.with_exchange_data_id(format!("exchange-{}", key.short()));
    }
    delegation
}

/// Generate valid security metadata with up to `max_delegations` delegations.
///
/// Some delegations get one alias in the equivalence table.
pub fn security_metadata_sized(max_delegations: usize) -> impl Strategy<Value = SecurityMetadata> {
    prop::collection::vec(
        (secret(), any::<DelegationParams>(), proptest::option::of(secret())),
        0..=max_delegations,
    )
    .prop_map(|entries| {
        let mut md = SecurityMetadata::new();
        let mut keys: Vec<DelegationKey> = Vec::new();
        for (secret, params, _) in &entries {
            let key = hash_secret(secret);
            if md.is_key_in_use(key.as_str()) {
                continue;
            }
            let delegation = delegation_from_params(&key, params, &keys);
            md.secure_delegations.insert(key.clone(), delegation);
            keys.push(key);
        }
        for ((_, _, alias), target) in entries.iter().zip(keys.iter().cycle()) {
            let Some(alias) = alias else { continue };
            // Aliases colliding with a used key are dropped.
            let _ = md.add_equivalence(hash_secret(alias), target.as_str());
        }
        md
    })
}

/// Generate valid security metadata of a reasonable size.
pub fn security_metadata() -> impl Strategy<Value = SecurityMetadata> {
    security_metadata_sized(6)
}
