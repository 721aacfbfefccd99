//! Batch validation.
//!
//! A batch is checked as a whole before any entity is loaded or mutated.
//! The first structural problem fails the entire batch.

use std::collections::BTreeMap;

use delegation_kernel_core::access_key::ACCESS_CONTROL_KEY_HEX_LEN;
use delegation_kernel_core::{AccessControlKey, EntityId};

use crate::error::ValidationError;
use crate::request::{BulkShareOrUpdateMetadataParams, EntityShareRequest, ShareEntityRequestDetails};

/// Validate every entity of a batch.
pub fn validate_bulk_params(params: &BulkShareOrUpdateMetadataParams) -> Result<(), ValidationError> {
    for (entity_id, details) in &params.requests_by_entity_id {
        validate_entity_requests(entity_id, details)?;
    }
    Ok(())
}

/// Validate the requests of a single entity.
pub fn validate_entity_requests(
    entity_id: &EntityId,
    details: &ShareEntityRequestDetails,
) -> Result<(), ValidationError> {
    let mut key_owner: BTreeMap<&str, &str> = BTreeMap::new();
    let mut root_requests = 0usize;

    for (request_id, request) in details.share_requests() {
        validate_access_control_keys(entity_id, request_id, request)?;
        validate_exchange_data(entity_id, request_id, request)?;

        for key in &request.access_control_keys {
            if let Some(first) = key_owner.insert(key.as_str(), request_id.as_str()) {
                return Err(ValidationError::DuplicateAccessControlKey {
                    entity_id: entity_id.clone(),
                    first: first.to_string(),
                    second: request_id.clone(),
                });
            }
        }

        if request.is_root() {
            root_requests += 1;
            if root_requests > 1 {
                return Err(ValidationError::MultipleRootRequests {
                    entity_id: entity_id.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_access_control_keys(
    entity_id: &EntityId,
    request_id: &str,
    request: &EntityShareRequest,
) -> Result<(), ValidationError> {
    if request.access_control_keys.is_empty() {
        return Err(ValidationError::EmptyAccessControlKeys {
            entity_id: entity_id.clone(),
            request_id: request_id.to_string(),
        });
    }
    for key in &request.access_control_keys {
        let malformed = |reason: String| ValidationError::MalformedAccessControlKey {
            entity_id: entity_id.clone(),
            request_id: request_id.to_string(),
            reason,
        };
        if key.len() != ACCESS_CONTROL_KEY_HEX_LEN {
            return Err(malformed(format!(
                "expected {} hex characters, got {}",
                ACCESS_CONTROL_KEY_HEX_LEN,
                key.len()
            )));
        }
        // Uppercase keys would hash like their lowercase form and slip past
        // the disjointness check.
        if key.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(malformed("access control keys must be lowercase hex".to_string()));
        }
        AccessControlKey::from_hex(key).map_err(|e| malformed(e.to_string()))?;
    }
    Ok(())
}

fn validate_exchange_data(
    entity_id: &EntityId,
    request_id: &str,
    request: &EntityShareRequest,
) -> Result<(), ValidationError> {
    let has_clear = request
        .exchange_data_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());
    let has_encrypted = !request.encrypted_exchange_data_id.is_empty();

    let reason = match request.explicit_parties() {
        1 if !has_encrypted || request.exchange_data_id.is_some() => Some(
            "with exactly one explicit party the exchange data id must be encrypted and not given in clear",
        ),
        2 if has_encrypted || !has_clear => Some(
            "with both parties explicit the exchange data id must be given in clear and not encrypted",
        ),
        0 if has_encrypted || request.exchange_data_id.is_some() => {
            Some("anonymous delegations must not reference exchange data")
        }
        _ => None,
    };

    match reason {
        Some(reason) => Err(ValidationError::ExchangeDataMismatch {
            entity_id: entity_id.clone(),
            request_id: request_id.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{EntityShareRequest, ShareEntityRequestDetails};
    use delegation_kernel_perms::RequestedPermission;
    use proptest::prelude::*;

    fn key(byte: u8) -> String {
        format!("{:02x}", byte).repeat(16)
    }

    fn batch(details: ShareEntityRequestDetails) -> BulkShareOrUpdateMetadataParams {
        BulkShareOrUpdateMetadataParams::new().with_entity("e1", details)
    }

    #[test]
    fn test_valid_batch() {
        let details = ShareEntityRequestDetails::new()
            .with_request(
                "r1",
                EntityShareRequest::new([key(1)])
                    .with_delegator("doc1")
                    .with_delegate("doc1")
                    .with_exchange_data_id("ex1")
                    .with_permission(RequestedPermission::Root),
            )
            .with_request(
                "r2",
                EntityShareRequest::new([key(2), key(3)])
                    .with_delegator("doc1")
                    .with_encrypted_exchange_data_id("fp", "enc"),
            )
            .with_request("r3", EntityShareRequest::new([key(4)]));
        assert!(validate_bulk_params(&batch(details)).is_ok());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let details = ShareEntityRequestDetails::new()
            .with_request("r1", EntityShareRequest::new([key(1)]))
            .with_request("r2", EntityShareRequest::new([key(2), key(1)]));
        assert!(matches!(
            validate_bulk_params(&batch(details)),
            Err(ValidationError::DuplicateAccessControlKey { .. })
        ));
    }

    #[test]
    fn test_same_key_on_different_entities_is_fine() {
        let params = BulkShareOrUpdateMetadataParams::new()
            .with_entity(
                "e1",
                ShareEntityRequestDetails::new().with_request("r1", EntityShareRequest::new([key(1)])),
            )
            .with_entity(
                "e2",
                ShareEntityRequestDetails::new().with_request("r1", EntityShareRequest::new([key(1)])),
            );
        assert!(validate_bulk_params(&params).is_ok());
    }

    #[test]
    fn test_two_roots_rejected() {
        let root = |k| {
            EntityShareRequest::new([key(k)]).with_permission(RequestedPermission::Root)
        };
        let details = ShareEntityRequestDetails::new()
            .with_request("r1", root(1))
            .with_request("r2", root(2));
        assert!(matches!(
            validate_bulk_params(&batch(details)),
            Err(ValidationError::MultipleRootRequests { .. })
        ));
    }

    #[test]
    fn test_exchange_data_rules() {
        let one_side_clear = EntityShareRequest::new([key(1)])
            .with_delegate("doc2")
            .with_exchange_data_id("ex");
        let both_missing = EntityShareRequest::new([key(1)])
            .with_delegator("doc1")
            .with_delegate("doc2");
        let both_blank = EntityShareRequest::new([key(1)])
            .with_delegator("doc1")
            .with_delegate("doc2")
            .with_exchange_data_id("  ");
        let anonymous_with_data = EntityShareRequest::new([key(1)])
            .with_encrypted_exchange_data_id("fp", "enc");

        for request in [one_side_clear, both_missing, both_blank, anonymous_with_data] {
            let details = ShareEntityRequestDetails::new().with_request("r", request);
            assert!(matches!(
                validate_bulk_params(&batch(details)),
                Err(ValidationError::ExchangeDataMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_malformed_keys() {
        for bad in ["abc".to_string(), "zz".repeat(16), "AA".repeat(16)] {
            let details =
                ShareEntityRequestDetails::new().with_request("r", EntityShareRequest::new([bad]));
            assert!(matches!(
                validate_bulk_params(&batch(details)),
                Err(ValidationError::MalformedAccessControlKey { .. })
            ));
        }
        let empty = EntityShareRequest::new(Vec::<String>::new());
        let details = ShareEntityRequestDetails::new().with_request("r", empty);
        assert!(matches!(
            validate_bulk_params(&batch(details)),
            Err(ValidationError::EmptyAccessControlKeys { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_disjointness_regardless_of_order(
            shared in any::<u8>(),
            others in proptest::collection::btree_set(any::<u8>(), 0..6),
            id_a in "[a-z]{1,6}",
            id_b in "[a-z]{1,6}",
        ) {
            prop_assume!(id_a != id_b);
            let extra: Vec<String> = others.iter().filter(|b| **b != shared).map(|b| key(*b)).collect();
            let mut keys_b = extra.clone();
            keys_b.push(key(shared));
            let details = ShareEntityRequestDetails::new()
                .with_request(id_a, EntityShareRequest::new([key(shared)]))
                .with_request(id_b, EntityShareRequest::new(keys_b));
            let is_duplicate = matches!(
                validate_bulk_params(&batch(details)),
                Err(ValidationError::DuplicateAccessControlKey { .. })
            );
            prop_assert!(is_duplicate);
        }
    }
}
