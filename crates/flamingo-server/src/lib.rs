//! HTTP server for Flamingo.
//!
//! Exposes project CRUD, step-grouped item ingestion, and known/unknown key
//! queries as a JSON API over axum.

pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::{ServerConfig, StorageConfig};
pub use error::{ServerError, ServerResult};
pub use server::FlamingoServer;
pub use state::AppState;
