//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] campus_storage::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] campus_session::SessionError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] campus_navigation::NavigationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
