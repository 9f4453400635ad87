//! Error types for propguard-engine

use core_protection::ProtectionError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by repositories and authorization proxies
#[derive(Error, Debug)]
pub enum EngineError {
    /// Image or membership does not exist, or is not visible to the requester
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requester may see the object but not perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Operation needs an authenticated requester
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Object already exists
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Property protection failure
    #[error(transparent)]
    Protection(#[from] ProtectionError),
}
