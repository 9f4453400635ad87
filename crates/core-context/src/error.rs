use thiserror::Error;

/// Errors raised while building a requester context
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContextError {
    #[error("Invalid role name: {0:?}")]
    InvalidRole(String),

    #[error("Invalid tenant identifier: {0:?}")]
    InvalidTenant(String),
}

/// Specific Result type for context operations
pub type Result<T> = std::result::Result<T, ContextError>;
