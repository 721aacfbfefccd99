//! Permission algebra.
//!
//! Turns a requested permission and the delegator's own access level into
//! the level actually granted by a new delegation.

use serde::{Deserialize, Serialize};
use std::fmt;

use delegation_kernel_core::{AccessLevel, DataOwnerId};

use crate::error::{PermsError, Result};

/// Permission asked for in a share request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedPermission {
    /// Read access; reserved for finer read tiers.
    MaxRead,
    /// Read access, always grantable.
    FullRead,
    /// Write access when the delegator can write, read otherwise.
    #[default]
    MaxWrite,
    /// Write access; fails when the delegator cannot write.
    FullWrite,
    /// Self-delegation with write access and no parents.
    Root,
}

impl RequestedPermission {
    pub fn is_root(self) -> bool {
        self == RequestedPermission::Root
    }
}

impl fmt::Display for RequestedPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestedPermission::MaxRead => "MAX_READ",
            RequestedPermission::FullRead => "FULL_READ",
            RequestedPermission::MaxWrite => "MAX_WRITE",
            RequestedPermission::FullWrite => "FULL_WRITE",
            RequestedPermission::Root => "ROOT",
        };
        f.write_str(s)
    }
}

/// Resolve the level a new delegation grants.
///
/// `current` is the delegator's level on the entity, `None` when it has no
/// access (for example on a fresh entity). Root eligibility is checked
/// separately by [`check_root_eligibility`].
pub fn resolve_permission(
    requested: RequestedPermission,
    current: Option<AccessLevel>,
) -> Result<AccessLevel> {
    let can_write = current == Some(AccessLevel::Write);
    match requested {
        RequestedPermission::FullRead | RequestedPermission::MaxRead => Ok(AccessLevel::Read),
        RequestedPermission::MaxWrite => Ok(if can_write {
            AccessLevel::Write
        } else {
            AccessLevel::Read
        }),
        RequestedPermission::FullWrite => {
            if can_write {
                Ok(AccessLevel::Write)
            } else {
                Err(PermsError::PermissionDenied(format!(
                    "FULL_WRITE requires write access, delegator has {}",
                    current.map_or_else(|| "none".to_string(), |l| l.to_string())
                )))
            }
        }
        RequestedPermission::Root => Ok(AccessLevel::Write),
    }
}

/// Check whether a root delegation may be created.
///
/// The delegation must go from a data owner to itself (both sides anonymous
/// counts as self). When the requester already reaches a root delegation it
/// may only add another one if it holds some delegation on the entity.
pub fn check_root_eligibility(
    delegator: Option<&DataOwnerId>,
    delegate: Option<&DataOwnerId>,
    holds_root: bool,
    current: Option<AccessLevel>,
) -> Result<()> {
    if delegator != delegate {
        return Err(PermsError::NotRootEligible(
            "root delegations must be self delegations".to_string(),
        ));
    }
    if holds_root && current.is_none() {
        return Err(PermsError::NotRootEligible(
            "data owner already has a root delegation on this entity".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_permission_table() {
        use AccessLevel::*;
        use RequestedPermission::*;

        assert_eq!(resolve_permission(FullRead, None).unwrap(), Read);
        assert_eq!(resolve_permission(FullRead, Some(Write)).unwrap(), Read);
        assert_eq!(resolve_permission(MaxRead, Some(Write)).unwrap(), Read);
        assert_eq!(resolve_permission(MaxWrite, Some(Write)).unwrap(), Write);
        assert_eq!(resolve_permission(MaxWrite, Some(Read)).unwrap(), Read);
        assert_eq!(resolve_permission(MaxWrite, None).unwrap(), Read);
        assert_eq!(resolve_permission(FullWrite, Some(Write)).unwrap(), Write);
        assert_eq!(resolve_permission(Root, None).unwrap(), Write);
    }

    #[test]
    fn test_full_write_denied_without_write() {
        assert!(matches!(
            resolve_permission(RequestedPermission::FullWrite, Some(AccessLevel::Read)),
            Err(PermsError::PermissionDenied(_))
        ));
        assert!(resolve_permission(RequestedPermission::FullWrite, None).is_err());
    }

    #[test]
    fn test_default_is_max_write() {
        assert_eq!(RequestedPermission::default(), RequestedPermission::MaxWrite);
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(
            serde_json::to_string(&RequestedPermission::FullWrite).unwrap(),
            "\"FULL_WRITE\""
        );
        let p: RequestedPermission = serde_json::from_str("\"ROOT\"").unwrap();
        assert!(p.is_root());
        assert_eq!(p.to_string(), "ROOT");
    }

    #[test]
    fn test_root_requires_self_delegation() {
        let a = DataOwnerId::new("a");
        let b = DataOwnerId::new("b");
        assert!(check_root_eligibility(Some(&a), Some(&a), false, None).is_ok());
        assert!(check_root_eligibility(None, None, false, None).is_ok());
        assert!(check_root_eligibility(Some(&a), Some(&b), false, None).is_err());
        assert!(check_root_eligibility(Some(&a), None, false, None).is_err());
    }

    #[test]
    fn test_root_with_existing_root() {
        let a = DataOwnerId::new("a");
        assert!(check_root_eligibility(Some(&a), Some(&a), true, None).is_err());
        assert!(
            check_root_eligibility(Some(&a), Some(&a), true, Some(AccessLevel::Read)).is_ok()
        );
    }

    fn any_requested() -> impl Strategy<Value = RequestedPermission> {
        prop_oneof![
            Just(RequestedPermission::MaxRead),
            Just(RequestedPermission::FullRead),
            Just(RequestedPermission::MaxWrite),
            Just(RequestedPermission::FullWrite),
        ]
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_delegator(requested in any_requested()) {
            for current in [None, Some(AccessLevel::Read)] {
                if let Ok(level) = resolve_permission(requested, current) {
                    prop_assert_eq!(level, AccessLevel::Read);
                }
            }
        }
    }
}
