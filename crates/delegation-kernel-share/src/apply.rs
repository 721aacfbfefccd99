//! Applying the requests of one entity.
//!
//! Requests are applied sequentially in a fixed order: the ROOT request,
//! then the other share requests, then update requests, each group in
//! request id order. Later requests see the delegations created by earlier
//! ones. A request that cannot be applied is recorded as rejected and the
//! others go on.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use delegation_kernel_core::{
    AccessLevel, CiphertextField, DelegationKey, SecureDelegation, SecuredEntity,
    SecurityMetadata,
};
use delegation_kernel_perms::{
    check_root_eligibility, resolve_permission, AccessContext, EntityAccess,
};

use crate::error::Result;
use crate::request::{
    EntityShareRequest, EntitySharedMetadataUpdateRequest, EntryUpdateType,
    ShareEntityRequestDetails,
};
use crate::result::RejectedRequest;

/// Tunables for request application.
#[derive(Clone, Debug)]
pub struct ApplyConfig {
    /// Patients may create a root delegation for themselves on any entity.
    pub allow_patient_self_root: bool,

    /// With no potential parents given, use every delegation the requester
    /// can access.
    pub auto_select_parents: bool,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            allow_patient_self_root: true,
            auto_select_parents: true,
        }
    }
}

/// Result of applying one entity's requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// The metadata after every accepted request.
    pub metadata: SecurityMetadata,
    /// Ids of the accepted requests.
    pub applied: BTreeSet<String>,
    /// Rejected requests by id.
    pub rejected: BTreeMap<String, RejectedRequest>,
}

impl ApplyOutcome {
    /// Whether anything changed.
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Apply a validated request set to an entity.
///
/// Pure: the entity is not modified, the next metadata is returned.
/// Integrity errors in the stored metadata abort the whole entity.
pub fn apply_entity_requests(
    entity: &SecuredEntity,
    details: &ShareEntityRequestDetails,
    ctx: &AccessContext,
    config: &ApplyConfig,
) -> Result<ApplyOutcome> {
    let mut state = ApplyState {
        entity,
        ctx,
        config,
        metadata: entity.security_metadata.clone(),
        access: EntityAccess::compute(&entity.security_metadata, &entity.legacy_delegates, ctx)?,
        new_roots: BTreeSet::new(),
        applied: BTreeSet::new(),
        rejected: BTreeMap::new(),
    };

    let entity_was_open = entity.has_no_access_holders();
    let (roots, shares): (Vec<_>, Vec<_>) = details.share_requests().partition(|(_, r)| r.is_root());

    for (request_id, request) in roots.into_iter().chain(shares) {
        if !entity_was_open && !state.access.has_any() && !state.patient_self_root(request) {
            state.reject(request_id, RejectedRequest::forbidden("no access to this entity"));
            continue;
        }
        match state.share(request, &details.potential_parent_delegations)? {
            Ok(key) => {
                debug!(entity = %entity.id, request = %request_id, key = key.short(), "created delegation");
                state.applied.insert(request_id.clone());
            }
            Err(rejection) => state.reject(request_id, rejection),
        }
    }

    for (request_id, request) in details.update_requests() {
        if !state.access.has_any() {
            state.reject(request_id, RejectedRequest::forbidden("no access to this entity"));
            continue;
        }
        match state.update(request)? {
            Ok(key) => {
                debug!(entity = %entity.id, request = %request_id, key = key.short(), "updated delegation");
                state.applied.insert(request_id.clone());
            }
            Err(rejection) => state.reject(request_id, rejection),
        }
    }

    Ok(ApplyOutcome {
        metadata: state.metadata,
        applied: state.applied,
        rejected: state.rejected,
    })
}

/// Either the key touched by a request, or why it was rejected.
type RequestResult = std::result::Result<DelegationKey, RejectedRequest>;

struct ApplyState<'a> {
    entity: &'a SecuredEntity,
    ctx: &'a AccessContext,
    config: &'a ApplyConfig,
    metadata: SecurityMetadata,
    access: EntityAccess,
    new_roots: BTreeSet<DelegationKey>,
    applied: BTreeSet<String>,
    rejected: BTreeMap<String, RejectedRequest>,
}

impl ApplyState<'_> {
    fn reject(&mut self, request_id: &str, rejection: RejectedRequest) {
        warn!(
            entity = %self.entity.id,
            request = %request_id,
            code = %rejection.code,
            retry = rejection.should_retry,
            reason = %rejection.reason,
            "request rejected"
        );
        self.rejected.insert(request_id.to_string(), rejection);
    }

    fn patient_self_root(&self, request: &EntityShareRequest) -> bool {
        self.config.allow_patient_self_root
            && request.is_root()
            && self.ctx.is_patient()
            && request.explicit_delegate.as_ref() == self.ctx.data_owner_id()
    }

    fn refresh_access(&mut self) -> Result<()> {
        self.access = EntityAccess::compute(&self.metadata, &self.entity.legacy_delegates, self.ctx)?;
        Ok(())
    }

    fn share(
        &mut self,
        request: &EntityShareRequest,
        potential_parents: &BTreeSet<DelegationKey>,
    ) -> Result<RequestResult> {
        if let Some(delegator) = &request.explicit_delegator {
            if !self.ctx.is_self_or_ancestor(delegator) {
                return Ok(Err(RejectedRequest::bad_request(
                    "explicit delegator must be the authenticated data owner or one of its parents",
                )));
            }
        }

        let keys = match request.delegation_keys() {
            Ok(keys) => keys,
            Err(e) => return Ok(Err(RejectedRequest::bad_request(e.to_string()))),
        };
        let Some((canonical, aliases)) = keys.split_first() else {
            return Ok(Err(RejectedRequest::bad_request("no access control keys")));
        };
        if keys.iter().any(|k| self.metadata.is_key_in_use(k.as_str())) {
            return Ok(Err(RejectedRequest::conflict(
                "a delegation already exists for one of these access control keys",
            )));
        }

        let (permissions, parents) = if request.is_root() {
            if !self.patient_self_root(request) {
                if let Err(e) = check_root_eligibility(
                    request.explicit_delegator.as_ref(),
                    request.explicit_delegate.as_ref(),
                    self.access.holds_root,
                    self.access.level,
                ) {
                    return Ok(Err(RejectedRequest::forbidden(e.to_string())));
                }
            } else if request.explicit_delegator != request.explicit_delegate {
                return Ok(Err(RejectedRequest::forbidden(
                    "root delegations must be self delegations",
                )));
            }
            (AccessLevel::Write, BTreeSet::new())
        } else {
            let level = match resolve_permission(request.requested_permissions, self.access.level) {
                Ok(level) => level,
                Err(e) => return Ok(Err(RejectedRequest::forbidden(e.to_string()))),
            };
            let parents = self.select_parents(potential_parents)?;
            if parents.is_empty() {
                return Ok(Err(RejectedRequest::forbidden(
                    "no accessible parent delegation; give valid potential parents or create a ROOT delegation",
                )));
            }
            (level, parents)
        };

        let mut delegation = SecureDelegation::new(
            request.explicit_delegator.clone(),
            request.explicit_delegate.clone(),
            permissions,
        )
        .with_parents(parents)
        .with_entries(CiphertextField::SecretIds, request.secret_ids.iter().cloned())
        .with_entries(CiphertextField::EncryptionKeys, request.encryption_keys.iter().cloned())
        .with_entries(CiphertextField::OwningEntityIds, request.owning_entity_ids.iter().cloned());
        delegation.exchange_data_id = request.exchange_data_id.clone();

        if let Err(e) = delegation.validate_as(canonical) {
            return Ok(Err(RejectedRequest::bad_request(e.to_string())));
        }

        self.metadata.insert_delegation(canonical.clone(), delegation)?;
        for alias in aliases {
            self.metadata.add_equivalence(alias.clone(), canonical.as_str())?;
        }
        if request.is_root() {
            self.new_roots.insert(canonical.clone());
        }
        self.refresh_access()?;
        Ok(Ok(canonical.clone()))
    }

    /// Parents for a new non-root delegation.
    ///
    /// Only delegations the requester can access are kept. Roots created
    /// earlier in the same batch are always candidates. A candidate is
    /// dropped when one of its ancestors is also a candidate.
    fn select_parents(&self, potential: &BTreeSet<DelegationKey>) -> Result<BTreeSet<DelegationKey>> {
        let mut parents = BTreeSet::new();
        if potential.is_empty() && self.config.auto_select_parents {
            parents.extend(self.access.accessible_keys.iter().cloned());
        } else {
            for key in potential {
                if let Some((canonical, _)) = self.metadata.get_delegation(key.as_str())? {
                    if self.access.accessible_keys.contains(&canonical) {
                        parents.insert(canonical);
                    }
                }
            }
            parents.extend(self.new_roots.iter().cloned());
        }
        Ok(parents
            .iter()
            .filter(|key| {
                !self
                    .metadata
                    .ancestors_of(key.as_str())
                    .iter()
                    .any(|ancestor| parents.contains(ancestor))
            })
            .cloned()
            .collect())
    }

    fn update(&mut self, request: &EntitySharedMetadataUpdateRequest) -> Result<RequestResult> {
        if request.is_noop() {
            return Ok(Err(RejectedRequest::bad_request(
                "update request does not update anything",
            )));
        }

        let hash = request.metadata_access_control_hash.as_str();
        let Some((canonical, current)) = self.metadata.get_delegation(hash)? else {
            return Ok(Err(RejectedRequest::not_found(
                true,
                format!("no delegation {} on entity {}", request.metadata_access_control_hash.short(), self.entity.id),
            )));
        };
        if !self.access.can_access_or_ancestor(&self.metadata, &canonical) {
            return Ok(Err(RejectedRequest::forbidden(
                "requester cannot access this delegation or any of its parents",
            )));
        }

        let mut updated = current.clone();
        for field in CiphertextField::ALL {
            let entries = updated.field_mut(field);
            for (entry, op) in request.updates(field) {
                let ok = match op {
                    EntryUpdateType::Create => entries.insert(entry.clone()),
                    EntryUpdateType::Delete => entries.remove(entry),
                };
                if !ok {
                    return Ok(Err(RejectedRequest::bad_request(
                        "request creates a duplicate entry or deletes a missing one",
                    )));
                }
            }
        }

        self.metadata.secure_delegations.insert(canonical.clone(), updated);
        Ok(Ok(canonical))
    }
}
