use flamingo_types::{ProjectId, Step, TypeError};

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced project does not exist.
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// Another project already uses this name.
    #[error("project name already taken: {0}")]
    ProjectNameTaken(String),

    /// A key collided under [`ConflictPolicy::Reject`](crate::ConflictPolicy::Reject).
    #[error("duplicate item key: {0}")]
    DuplicateKey(String),

    /// The step counter moved between read and advance.
    #[error("step conflict on project {project}: expected {expected}, found {actual}")]
    StepConflict {
        project: ProjectId,
        expected: Step,
        actual: Step,
    },

    /// Input failed validation before reaching storage.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] TypeError),

    /// Error from the SQLite backend.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding a store lock.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
