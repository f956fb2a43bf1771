//! services/tracker/src/adapters/memory.rs
//!
//! Process-local `KeyValueStore`. Nothing outlives the process.

use async_trait::async_trait;
use scrap_tracker_core::ports::{KeyValueStore, PortResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous read, for callers that cannot await.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.items().get(key).cloned()
    }

    fn items(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.peek(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> PortResult<()> {
        self.items().remove(key);
        Ok(())
    }
}
