//! Golden test vectors for deterministic verification.
//!
//! Anonymous delegations are stored under the lowercase hex SHA-256 of the
//! access-control secret. These vectors pin that derivation so every
//! implementation sharing a database computes the same keys.

use delegation_kernel_core::hash_secret;

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The secret bytes.
    pub secret: Vec<u8>,
    /// Expected delegation key (lowercase hex).
    pub expected_key: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "secret of 0xaa bytes",
            secret: vec![0xaa; 16],
            expected_key: "bc1443a0d17aab2db1ea0302ef280717ac9a2f23355c5b649ea87d605430458d",
        },
        GoldenVector {
            name: "all zero secret",
            secret: vec![0x00; 16],
            expected_key: "374708fff7719dd5979ec875d56cd2286f6d3cf7ec317a3b25632aab28ec37bb",
        },
        GoldenVector {
            name: "secret of 0x01 bytes",
            secret: vec![0x01; 16],
            expected_key: "cc8cd41cef907c4d216069122c4b89936211361f9050a717a1e37ad1862e952f",
        },
        GoldenVector {
            name: "all ones secret",
            secret: vec![0xff; 16],
            expected_key: "5ac6a5945f16500911219129984ba8b387a06f24fe383ce4e81a73294065461b",
        },
        GoldenVector {
            name: "counting secret",
            secret: (0u8..16).collect(),
            expected_key: "be45cb2605bf36bebde684841a28f0fd43c69850a3dce5fedba69928ee3a8991",
        },
        // Hashing does not depend on the secret length.
        GoldenVector {
            name: "empty input",
            secret: Vec::new(),
            expected_key: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        },
        GoldenVector {
            name: "abc",
            secret: b"abc".to_vec(),
            expected_key: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        },
    ]
}

/// Check every vector, returning `(name, passed)` pairs.
pub fn verify_all_vectors() -> Vec<(&'static str, bool)> {
    all_vectors()
        .into_iter()
        .map(|v| (v.name, hash_secret(&v.secret).as_str() == v.expected_key))
        .collect()
}
