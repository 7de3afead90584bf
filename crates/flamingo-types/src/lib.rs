//! Foundation types for Flamingo.
//!
//! Flamingo tracks *projects* and the *items* that belong to them. Items are
//! only ever inserted in batches, and every batch is tagged with the owning
//! project's current [`Step`]. The step counter advances exactly once per
//! batch, which makes "everything inserted by batch N" recoverable after the
//! fact.
//!
//! # Key Types
//!
//! - [`ProjectId`] / [`ItemId`] -- system-assigned row identities
//! - [`Step`] -- per-project batch counter
//! - [`Project`], [`NewProject`], [`ProjectPatch`] -- the project record and its mutations
//! - [`Item`], [`CandidateItem`], [`NewItem`] -- the item record, a caller's
//!   candidate, and a candidate tagged for insertion

pub mod error;
pub mod ids;
pub mod item;
pub mod project;
pub mod step;

pub use error::TypeError;
pub use ids::{ItemId, ProjectId};
pub use item::{validate_key, CandidateItem, Item, NewItem, MAX_KEY_LEN};
pub use project::{validate_name, NewProject, Project, ProjectPatch, MAX_NAME_LEN};
pub use step::Step;
