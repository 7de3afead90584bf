use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use flamingo_store::Storage;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Flamingo HTTP server.
pub struct FlamingoServer {
    config: ServerConfig,
    state: AppState,
}

impl FlamingoServer {
    /// Open the configured storage backend and build the server around it.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let storage = config.storage.open()?;
        Ok(Self::with_storage(config, storage))
    }

    pub fn with_storage(config: ServerConfig, storage: Arc<dyn Storage>) -> Self {
        Self {
            config,
            state: AppState::new(storage),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with body limit and request tracing (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "flamingo server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!("flamingo server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for ctrl-c, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
