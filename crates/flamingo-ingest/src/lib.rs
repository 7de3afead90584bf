//! Step-grouped ingestion for Flamingo.
//!
//! This crate is where batches happen. It provides:
//! - [`IngestionEngine`] -- inserts the unknown keys of a candidate batch,
//!   tags them with the project's current step, and advances the step once,
//!   all inside one storage transaction
//! - [`ProjectLocks`] -- per-project serialization so that concurrent
//!   batches against one project are strictly ordered
//! - [`QueryLayer`] -- read-only known/unknown key queries scoped by project

pub mod engine;
pub mod error;
pub mod locks;
pub mod query;

pub use engine::{IngestReport, IngestionEngine};
pub use error::{IngestError, IngestResult};
pub use locks::ProjectLocks;
pub use query::{KeyPartition, QueryLayer};
