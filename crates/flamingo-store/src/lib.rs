//! Persistent project and item storage for Flamingo.
//!
//! The store holds two record kinds: projects (with their step counter) and
//! items (with a globally unique key). It knows nothing about ingestion
//! batches beyond the two primitives ingestion is built from: a
//! conflict-ignoring batch insert and a compare-and-advance of the step
//! counter, both available inside one [`StoreTransaction`].
//!
//! # Traits
//!
//! - [`ProjectRegistry`] -- project CRUD with unique names and cascade delete
//! - [`KeyStore`] -- item lookups scoped by project
//! - [`Storage`] -- both of the above plus transactions
//!
//! # Backends
//!
//! - [`InMemoryStore`] -- `RwLock`-guarded maps for tests and embedding
//! - [`SqliteStore`] -- SQLite database file via `rusqlite`
//!
//! # Rules
//!
//! 1. Item keys are unique across the whole store. The backend enforces this,
//!    not its callers.
//! 2. A duplicate key under [`ConflictPolicy::Ignore`] is an expected outcome:
//!    the item is left out of the returned set, nothing fails.
//! 3. A transaction that is dropped without `commit` leaves no trace.
//! 4. Deleting a project deletes its items.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
mod conformance;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ConflictPolicy, KeyStore, ProjectRegistry, Storage, StoreTransaction};
