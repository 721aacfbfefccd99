//! Security metadata: the per-entity delegation graph.
//!
//! `SecurityMetadata` is a plain value. Every mutation in the kernel takes a
//! snapshot, computes the next value and hands it to the store; nothing
//! mutates a shared instance in place.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::delegation::{AccessLevel, SecureDelegation};
use crate::error::{CoreError, IntegrityError, Result};
use crate::types::DelegationKey;

/// Delegation graph and key equivalences of one entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityMetadata {
    /// Delegations by canonical key.
    #[serde(default)]
    pub secure_delegations: BTreeMap<DelegationKey, SecureDelegation>,

    /// Alias key to the key it stands for.
    #[serde(default)]
    pub keys_equivalences: BTreeMap<DelegationKey, DelegationKey>,
}

impl SecurityMetadata {
    /// Empty metadata, as held by a freshly created entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the entity has no delegations at all.
    pub fn is_empty(&self) -> bool {
        self.secure_delegations.is_empty()
    }

    /// Follow key equivalences until a key has no further mapping.
    ///
    /// A key without any equivalence canonicalizes to itself. Cycles are
    /// reported as [`IntegrityError::EquivalenceCycle`].
    pub fn canonicalize(&self, key: &str) -> std::result::Result<DelegationKey, IntegrityError> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut current = key;
        while let Some(next) = self.keys_equivalences.get(current) {
            if !seen.insert(current) {
                return Err(IntegrityError::EquivalenceCycle {
                    key: key.to_string(),
                });
            }
            current = next.as_str();
        }
        Ok(DelegationKey::new(current))
    }

    /// Look up a delegation by its key or any alias of it.
    pub fn get_delegation(
        &self,
        key_or_alias: &str,
    ) -> std::result::Result<Option<(DelegationKey, &SecureDelegation)>, IntegrityError> {
        let canonical = self.canonicalize(key_or_alias)?;
        Ok(self
            .secure_delegations
            .get(canonical.as_str())
            .map(|d| (canonical, d)))
    }

    /// Every alias that canonicalizes to `key`, excluding `key` itself.
    pub fn all_aliases_of(
        &self,
        key: &str,
    ) -> std::result::Result<BTreeSet<DelegationKey>, IntegrityError> {
        let mut aliases = BTreeSet::new();
        for alias in self.keys_equivalences.keys() {
            if self.canonicalize(alias.as_str())?.as_str() == key {
                aliases.insert(alias.clone());
            }
        }
        Ok(aliases)
    }

    /// Map every canonical key to the aliases pointing at it.
    fn alias_table(
        &self,
    ) -> std::result::Result<BTreeMap<DelegationKey, Vec<DelegationKey>>, IntegrityError> {
        let mut table: BTreeMap<DelegationKey, Vec<DelegationKey>> = BTreeMap::new();
        for alias in self.keys_equivalences.keys() {
            let canonical = self.canonicalize(alias.as_str())?;
            table.entry(canonical).or_default().push(alias.clone());
        }
        Ok(table)
    }

    /// Compute who can reach this entity and with which level.
    ///
    /// Explicit delegators and delegates are emitted under their id. A
    /// delegation with an anonymous side is also emitted under its own key
    /// and every alias of that key, so that holders of the secret can find
    /// it. Levels from several delegations combine to the highest.
    ///
    /// The accessor index of the entity store is built from this function.
    pub fn resolve_accessors(
        &self,
    ) -> std::result::Result<BTreeMap<String, AccessLevel>, IntegrityError> {
        let aliases = self.alias_table()?;
        let mut accessors: BTreeMap<String, AccessLevel> = BTreeMap::new();
        let mut emit = |id: &str, level: AccessLevel| {
            accessors
                .entry(id.to_string())
                .and_modify(|existing| *existing = existing.combine(level))
                .or_insert(level);
        };

        for (key, delegation) in &self.secure_delegations {
            if let Some(delegator) = &delegation.delegator {
                emit(delegator.as_str(), delegation.permissions);
            }
            if let Some(delegate) = &delegation.delegate {
                emit(delegate.as_str(), delegation.permissions);
            }
            if delegation.has_anonymous_side() {
                emit(key.as_str(), delegation.permissions);
                for alias in aliases.get(key).into_iter().flatten() {
                    emit(alias.as_str(), delegation.permissions);
                }
            }
        }
        Ok(accessors)
    }

    /// Whether the id or hash appears anywhere in the graph.
    pub fn has_access(&self, id_or_hash: &str) -> bool {
        self.secure_delegations.contains_key(id_or_hash)
            || self.keys_equivalences.contains_key(id_or_hash)
            || self
                .secure_delegations
                .values()
                .any(|d| d.involves(id_or_hash))
    }

    /// Accessors holding at least `level`.
    pub fn data_owner_ids_with_access_of_at_least(
        &self,
        level: AccessLevel,
    ) -> std::result::Result<BTreeSet<String>, IntegrityError> {
        Ok(self
            .resolve_accessors()?
            .into_iter()
            .filter(|(_, l)| *l >= level)
            .map(|(id, _)| id)
            .collect())
    }

    /// Whether `key` is already used as a delegation key or an alias.
    pub fn is_key_in_use(&self, key: &str) -> bool {
        self.secure_delegations.contains_key(key) || self.keys_equivalences.contains_key(key)
    }

    /// Insert a new delegation under a key not yet in use.
    pub fn insert_delegation(
        &mut self,
        key: DelegationKey,
        delegation: SecureDelegation,
    ) -> Result<()> {
        if self.is_key_in_use(key.as_str()) {
            return Err(CoreError::DuplicateDelegationKey(key.into_inner()));
        }
        self.secure_delegations.insert(key, delegation);
        Ok(())
    }

    /// Register `alias` as equivalent to an existing delegation key.
    pub fn add_equivalence(&mut self, alias: DelegationKey, target: &str) -> Result<()> {
        if self.is_key_in_use(alias.as_str()) {
            return Err(CoreError::DuplicateDelegationKey(alias.into_inner()));
        }
        let canonical = self.canonicalize(target)?;
        if !self.secure_delegations.contains_key(canonical.as_str()) {
            return Err(CoreError::UnknownDelegation(target.to_string()));
        }
        self.keys_equivalences.insert(alias, canonical);
        Ok(())
    }

    /// Every delegation reachable by following parent links from `key`.
    ///
    /// The starting key is not included unless it is its own ancestor.
    pub fn ancestors_of(&self, key: &str) -> BTreeSet<DelegationKey> {
        let mut ancestors = BTreeSet::new();
        let mut stack: Vec<&DelegationKey> = self
            .secure_delegations
            .get(key)
            .map(|d| d.parent_delegations.iter().collect())
            .unwrap_or_default();
        while let Some(parent) = stack.pop() {
            if !ancestors.insert(parent.clone()) {
                continue;
            }
            if let Some(d) = self.secure_delegations.get(parent) {
                stack.extend(d.parent_delegations.iter());
            }
        }
        ancestors
    }

    /// Root delegations and their keys.
    pub fn roots(&self) -> impl Iterator<Item = (&DelegationKey, &SecureDelegation)> {
        self.secure_delegations.iter().filter(|(_, d)| d.is_root())
    }

    /// Check every graph invariant.
    ///
    /// Fails with the first violation found; keys are visited in order so
    /// the reported violation is deterministic.
    pub fn validate(&self) -> std::result::Result<(), IntegrityError> {
        for alias in self.keys_equivalences.keys() {
            if self.secure_delegations.contains_key(alias) {
                return Err(IntegrityError::AmbiguousKey {
                    key: alias.to_string(),
                });
            }
            let target = self.canonicalize(alias.as_str())?;
            if !self.secure_delegations.contains_key(&target) {
                return Err(IntegrityError::DanglingEquivalence {
                    alias: alias.to_string(),
                    target: target.into_inner(),
                });
            }
        }

        for (key, delegation) in &self.secure_delegations {
            delegation.validate_as(key)?;
            for parent in &delegation.parent_delegations {
                if !self.secure_delegations.contains_key(parent) {
                    return Err(IntegrityError::DanglingParent {
                        delegation: key.to_string(),
                        parent: parent.to_string(),
                    });
                }
            }
        }

        self.check_parents_acyclic()
    }

    fn check_parents_acyclic(&self) -> std::result::Result<(), IntegrityError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        let mut marks: BTreeMap<&DelegationKey, Mark> = BTreeMap::new();
        for start in self.secure_delegations.keys() {
            if marks.contains_key(start) {
                continue;
            }
            // Iterative DFS over (node, parents not yet visited).
            let mut stack: Vec<(&DelegationKey, Vec<&DelegationKey>)> = Vec::new();
            marks.insert(start, Mark::InProgress);
            stack.push((start, self.parents_of(start)));
            while let Some((node, pending)) = stack.last_mut() {
                match pending.pop() {
                    Some(parent) => match marks.get(parent) {
                        Some(Mark::InProgress) => {
                            return Err(IntegrityError::ParentCycle {
                                key: parent.to_string(),
                            });
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(parent, Mark::InProgress);
                            let next = self.parents_of(parent);
                            stack.push((parent, next));
                        }
                    },
                    None => {
                        marks.insert(*node, Mark::Done);
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }

    fn parents_of(&self, key: &DelegationKey) -> Vec<&DelegationKey> {
        self.secure_delegations
            .get(key)
            .map(|d| d.parent_delegations.iter().collect())
            .unwrap_or_default()
    }
}
