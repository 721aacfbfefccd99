//! Strong type definitions for the delegation kernel.
//!
//! Identifiers are newtypes so a data owner id can never be passed where a
//! delegation key is expected, even though both are strings on the wire.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// An encrypted payload entry (secret id, encryption key or owning entity id).
///
/// The kernel never decrypts these; they are moved around as opaque strings.
pub type Base64String = String;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $debug:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the underlying string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($debug, "({})"), short(&self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(
    /// Key of a secure delegation inside one entity's metadata.
    ///
    /// Either a data owner id (explicit delegation) or the hex-encoded SHA-256
    /// hash of an access-control key (anonymous delegation).
    DelegationKey,
    "DelegationKey"
);

string_id!(
    /// Id of a data owner (healthcare party, patient or device).
    DataOwnerId,
    "DataOwnerId"
);

string_id!(
    /// Id of a stored entity carrying security metadata.
    EntityId,
    "EntityId"
);

impl DelegationKey {
    /// Truncated form safe for log output.
    pub fn short(&self) -> &str {
        short(&self.0)
    }
}

/// Keep at most 12 characters, on a char boundary.
fn short(value: &str) -> &str {
    match value.char_indices().nth(12) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Monotonic revision of a stored entity.
///
/// Used by the entity store for compare-and-swap writes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    /// Revision assigned on first save.
    pub const FIRST: Self = Self(1);

    /// The revision following this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Get the raw counter.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({})", self.0)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_delegation_key_debug_is_truncated() {
        let key = DelegationKey::new("bc1443a0d17aab2db1ea0302ef280717");
        assert_eq!(format!("{:?}", key), "DelegationKey(bc1443a0d17a)");
        assert_eq!(key.to_string(), "bc1443a0d17aab2db1ea0302ef280717");
    }

    #[test]
    fn test_short_keys_are_not_padded() {
        let id = DataOwnerId::new("doc1");
        assert_eq!(format!("{:?}", id), "DataOwnerId(doc1)");
    }

    #[test]
    fn test_map_lookup_by_str() {
        let mut map = BTreeMap::new();
        map.insert(DelegationKey::new("abc"), 1);
        assert_eq!(map.get("abc"), Some(&1));
    }

    #[test]
    fn test_revision_next() {
        assert_eq!(Revision::FIRST.next(), Revision(2));
        assert!(Revision(3) > Revision::FIRST);
    }

    #[test]
    fn test_serde_transparent() {
        let key = DelegationKey::new("k1");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"k1\"");
        assert_eq!(serde_json::to_string(&Revision(7)).unwrap(), "7");
    }
}
