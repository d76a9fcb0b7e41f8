//! Named persistence slots
//!
//! A slot holds one complete serialized value per key. Writers always
//! replace the whole value so readers never observe a partial update.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::Result;

pub trait Slot: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Slot that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySlot {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Slot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}
