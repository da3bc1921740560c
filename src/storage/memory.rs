use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::traits::KeyValueStore;
use crate::error::BoxError;

/// In-process [`KeyValueStore`].
///
/// Clones share the same map, so a test can keep a handle and inspect or
/// tamper with what the session persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Synchronous read, bypassing the async interface.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Synchronous write, bypassing the async interface.
    pub fn poke(&self, key: &str, value: impl Into<String>) {
        self.entries.lock().insert(key.to_string(), value.into());
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: Option<String>) -> Result<(), BoxError> {
        let mut entries = self.entries.lock();
        match value {
            Some(v) => {
                entries.insert(key.to_string(), v);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BoxError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), BoxError> {
        self.entries.lock().clear();
        Ok(())
    }
}
