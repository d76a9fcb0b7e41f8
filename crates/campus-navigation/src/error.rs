//! Navigation error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("Route path must be absolute: {0}")]
    InvalidPath(String),
}
