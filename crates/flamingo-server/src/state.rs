use std::sync::Arc;

use flamingo_ingest::{IngestionEngine, QueryLayer};
use flamingo_store::{InMemoryStore, Storage};

/// Shared handler state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    storage: Arc<dyn Storage>,
    engine: Arc<IngestionEngine>,
    queries: QueryLayer,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            engine: Arc::new(IngestionEngine::new(Arc::clone(&storage))),
            queries: QueryLayer::new(Arc::clone(&storage)),
            storage,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn engine(&self) -> &Arc<IngestionEngine> {
        &self.engine
    }

    pub fn queries(&self) -> &QueryLayer {
        &self.queries
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
