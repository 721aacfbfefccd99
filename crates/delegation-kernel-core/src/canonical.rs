//! Canonical encoding of security metadata.
//!
//! Metadata is encoded as CBOR through its serde form. All collections are
//! ordered maps and sets and struct fields have a fixed order, so equal
//! values always produce identical bytes. The digest of those bytes lets two
//! replicas check that a merge converged without shipping the full value.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::metadata::SecurityMetadata;

/// Domain separation context for metadata digests.
const DIGEST_CONTEXT: &str = "delegation-kernel 2024 security-metadata digest v1";

/// A 32-byte BLAKE3 digest of canonical metadata bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataDigest(pub [u8; 32]);

impl MetadataDigest {
    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for MetadataDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetadataDigest({})", &self.to_hex()[..16])
    }
}

/// Encode metadata to canonical CBOR bytes.
pub fn canonical_metadata_bytes(metadata: &SecurityMetadata) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(metadata, &mut buf)
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}

/// Decode metadata from bytes produced by [`canonical_metadata_bytes`].
pub fn metadata_from_canonical_bytes(bytes: &[u8]) -> Result<SecurityMetadata> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

/// Digest of the canonical encoding.
pub fn metadata_digest(metadata: &SecurityMetadata) -> Result<MetadataDigest> {
    let bytes = canonical_metadata_bytes(metadata)?;
    let mut hasher = blake3::Hasher::new_derive_key(DIGEST_CONTEXT);
    hasher.update(&bytes);
    Ok(MetadataDigest(*hasher.finalize().as_bytes()))
}
