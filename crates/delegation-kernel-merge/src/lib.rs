//! # Delegation Kernel Merge
//!
//! Reconciling divergent versions of an entity's security metadata.
//!
//! ## Overview
//!
//! When two writers update the same entity concurrently, the second save
//! fails with a revision conflict. [`merge_versions`] combines the version
//! the writer computed with the version now stored:
//!
//! - **No loss**: every delegation, alias and ciphertext of both sides is kept
//! - **Fatal on ambiguity**: a key meaning different things on the two sides
//!   is a [`MergeError::Conflict`], never resolved by guessing
//! - **Convergent**: merging both ways and merging the results again is stable
//!
//! [`verify_convergence`] compares two replicas by canonical digest.
//!
//! ## Duplicate entities
//!
//! [`merge_duplicated_into`] merges the metadata of two distinct entities
//! standing for the same subject. It is not commutative.

pub mod convergence;
pub mod error;
pub mod merge;

pub use convergence::{verify_all_entities, verify_convergence, ConvergenceResult};
pub use error::{MergeError, Result};
pub use merge::{merge_duplicated_into, merge_versions};
