//! Campus Storage Layer
//!
//! SQLite-based persistence for client state.
//! Every slot write replaces the whole stored value.

mod database;
mod error;
mod migrations;
mod slot;

pub use database::Database;
pub use error::StorageError;
pub use slot::{MemorySlot, Slot};

pub type Result<T> = std::result::Result<T, StorageError>;
