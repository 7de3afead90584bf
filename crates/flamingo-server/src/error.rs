use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flamingo_ingest::IngestError;
use flamingo_store::StoreError;
use thiserror::Error;

use crate::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The request could not be extracted (bad JSON, path or query).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Rejected { status, .. } => *status,
            ServerError::Store(StoreError::StepConflict { .. }) => StatusCode::CONFLICT,
            ServerError::Store(_)
            | ServerError::Config(_)
            | ServerError::Io(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProjectNotFound(_) => ServerError::NotFound(err.to_string()),
            StoreError::ProjectNameTaken(_) | StoreError::DuplicateKey(_) => {
                ServerError::Conflict(err.to_string())
            }
            StoreError::InvalidInput(inner) => ServerError::InvalidInput(inner.to_string()),
            other => ServerError::Store(other),
        }
    }
}

impl From<IngestError> for ServerError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::ProjectNotFound(_) => ServerError::NotFound(err.to_string()),
            IngestError::InvalidInput(inner) => ServerError::InvalidInput(inner.to_string()),
            IngestError::Store(inner) => inner.into(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
