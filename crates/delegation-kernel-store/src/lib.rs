//! # Delegation Kernel Store
//!
//! Storage abstraction for the delegation kernel. Provides a trait-based
//! interface for entity persistence with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`EntityStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`SaveOutcome`] - Result of a conditional save
//!
//! ## Usage
//!
//! ```rust,no_run
//! use delegation_kernel_core::SecuredEntity;
//! use delegation_kernel_store::{EntityStore, SaveOutcome, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("entities.db").unwrap();
//!
//!     match store.save(&SecuredEntity::new("e1")).await.unwrap() {
//!         SaveOutcome::Saved(entity) => println!("saved at {:?}", entity.rev),
//!         SaveOutcome::Conflict { .. } => println!("already exists"),
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Optimistic writes**: saves carry the revision they were read at and
//!   fail with `Conflict` if someone else wrote in between
//! - **Reverse index**: the accessor index is rewritten in the same
//!   transaction as the entity, from the same function access checks use

pub mod error;
pub mod index;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use index::index_entries;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{EntityStore, SaveOutcome, StoreExt};
