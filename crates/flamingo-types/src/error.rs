use thiserror::Error;

/// Errors produced by type construction and validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("project name must not be empty")]
    EmptyName,

    #[error("project name too long: {len} characters (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("item key must not be empty")]
    EmptyKey,

    #[error("item key too long: {len} characters (max {max})")]
    KeyTooLong { len: usize, max: usize },

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("step counter overflow")]
    StepOverflow,
}
