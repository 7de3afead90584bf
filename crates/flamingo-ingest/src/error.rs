use flamingo_store::StoreError;
use flamingo_types::{ProjectId, TypeError};

/// Errors produced by ingestion and queries.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] TypeError),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProjectNotFound(id) => Self::ProjectNotFound(id),
            StoreError::InvalidInput(err) => Self::InvalidInput(err),
            other => Self::Store(other),
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
