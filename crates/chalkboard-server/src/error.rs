//! Server error types.

use crate::registry::RegistryError;
use chalkboard_core::DocumentError;
use thiserror::Error;

/// Errors returned by engine operations and server startup.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("display name {0:?} is already in use")]
    NameTaken(String),
    #[error("connection has not been approved")]
    NotApproved,
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
