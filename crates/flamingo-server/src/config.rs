use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flamingo_store::{InMemoryStore, SqliteStore, Storage};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Default request body limit, large enough for batches of a few thousand items.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            storage: StorageConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Read a TOML config file. Missing keys fall back to the defaults.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }
}

/// Which backend holds projects and items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Sqlite { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: PathBuf::from("flamingo.db"),
        }
    }
}

impl StorageConfig {
    pub fn open(&self) -> ServerResult<Arc<dyn Storage>> {
        let storage: Arc<dyn Storage> = match self {
            StorageConfig::Memory => Arc::new(InMemoryStore::new()),
            StorageConfig::Sqlite { path } => Arc::new(SqliteStore::open(path)?),
        };
        Ok(storage)
    }
}
