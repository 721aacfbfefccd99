//! Access-control key resolution.
//!
//! An access-control key is a 16-byte secret shared out of band. The hex
//! SHA-256 of the secret is used as a delegation key so that the store never
//! learns who holds the secret.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use subtle::ConstantTimeEq;

use crate::error::{CoreError, Result};
use crate::types::DelegationKey;

/// Length in bytes of a decoded access-control key.
pub const ACCESS_CONTROL_KEY_LEN: usize = 16;

/// Length of the hex form of an access-control key.
pub const ACCESS_CONTROL_KEY_HEX_LEN: usize = ACCESS_CONTROL_KEY_LEN * 2;

/// Hash a raw secret into the delegation key it unlocks.
pub fn hash_secret(secret: &[u8]) -> DelegationKey {
    let digest = Sha256::digest(secret);
    DelegationKey::new(hex::encode(digest))
}

/// Hash every secret, dropping duplicates.
pub fn resolve_hashes<I, B>(secrets: I) -> BTreeSet<DelegationKey>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    secrets
        .into_iter()
        .map(|secret| hash_secret(secret.as_ref()))
        .collect()
}

/// Compare two hex digests without early exit on the first differing byte.
pub fn digests_equal(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// A decoded 16-byte access-control key.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessControlKey([u8; ACCESS_CONTROL_KEY_LEN]);

impl AccessControlKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; ACCESS_CONTROL_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from the 32-character hex wire form.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != ACCESS_CONTROL_KEY_HEX_LEN {
            return Err(CoreError::InvalidAccessControlKey(format!(
                "expected {} hex characters, got {}",
                ACCESS_CONTROL_KEY_HEX_LEN,
                s.len()
            )));
        }
        let bytes =
            hex::decode(s).map_err(|e| CoreError::InvalidAccessControlKey(e.to_string()))?;
        let mut arr = [0u8; ACCESS_CONTROL_KEY_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; ACCESS_CONTROL_KEY_LEN] {
        &self.0
    }

    /// The delegation key this secret unlocks.
    pub fn delegation_key(&self) -> DelegationKey {
        hash_secret(&self.0)
    }
}

impl fmt::Debug for AccessControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessControlKey(<redacted>)")
    }
}

impl AsRef<[u8]> for AccessControlKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
