//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid sign-in result: {0}")]
    InvalidSignIn(String),

    #[error("Storage error: {0}")]
    Storage(#[from] campus_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),
}
