//! # Delegation Kernel Testkit
//!
//! Testing utilities for the delegation kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known secrets with the delegation keys they must hash to
//! - **Generators**: Proptest strategies producing valid security metadata
//! - **Fixtures**: Helpers for requesters, hierarchies and access contexts
//!
//! ## Golden Vectors
//!
//! Anonymous delegations are keyed by the SHA-256 of a secret. Every
//! implementation must agree on these keys:
//!
//! ```rust
//! use delegation_kernel_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok) in verify_all_vectors() {
//!     assert!(ok, "vector {} failed", name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use delegation_kernel_testkit::generators::security_metadata;
//!
//! proptest! {
//!     #[test]
//!     fn generated_metadata_is_valid(md in security_metadata()) {
//!         prop_assert!(md.validate().is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use delegation_kernel_perms::DataOwnerType;
//! use delegation_kernel_testkit::fixtures::{context_for, hex_key};
//!
//! let ctx = context_for("doc1", DataOwnerType::Hcp, &[[0xaa; 16]]);
//! assert_eq!(hex_key(0xaa).len(), 32);
//! assert_eq!(ctx.access_control_keys_hashes().len(), 1);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{context_for, hex_key, HierarchyFixture};
