use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use super::slots::Slot;
use super::traits::KeyValueStore;
use crate::error::BoxError;

/// Slot-addressed façade over a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct Storage<S> {
    store: S,
}

impl<S: KeyValueStore> Storage<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Read a slot's raw string value.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn get(&self, slot: Slot) -> Result<Option<String>, BoxError> {
        tracing::debug!(slot = %slot, "Fetching persisted slot");
        self.store.get(slot.key()).await
    }

    /// Write a slot's raw string value.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn set(&self, slot: Slot, value: impl Into<String>) -> Result<(), BoxError> {
        self.store.set(slot.key(), Some(value.into())).await
    }

    /// Serialize `value` as JSON into `slot`.
    ///
    /// # Errors
    ///
    /// Returns serialization or backend failures.
    pub async fn set_json<T: Serialize + Sync>(&self, slot: Slot, value: &T) -> Result<(), BoxError> {
        let encoded = serde_json::to_string(value)?;
        self.set(slot, encoded).await
    }

    /// Store `bytes` base64-encoded (standard alphabet, padded) into `slot`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn set_bytes(&self, slot: Slot, bytes: &[u8]) -> Result<(), BoxError> {
        self.set(slot, STANDARD.encode(bytes)).await
    }

    /// Delete one slot.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn remove(&self, slot: Slot) -> Result<(), BoxError> {
        self.store.remove(slot.key()).await
    }

    /// Delete every listed slot, continuing past failures. Returns how many failed.
    pub async fn remove_all(&self, slots: &[Slot]) -> usize {
        let mut failed = 0;
        for &slot in slots {
            if let Err(e) = self.remove(slot).await {
                tracing::warn!(slot = %slot, error = %e, "Slot removal failed");
                failed += 1;
            }
        }
        failed
    }
}

/// Decode a value written by [`Storage::set_bytes`].
pub(crate) fn decode_bytes(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn slots_use_stable_keys() {
        let backend = MemoryStore::new();
        let storage = Storage::new(backend.clone());
        storage.set(Slot::Credentials, "{}").await.unwrap();
        assert_eq!(backend.peek("XboxLogin").as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn bytes_are_base64() {
        let backend = MemoryStore::new();
        let storage = Storage::new(backend.clone());
        storage.set_bytes(Slot::Artifact, &[0xde, 0xad, 0xbe, 0xef]).await.unwrap();

        let raw = backend.peek("LoadedSave").unwrap();
        assert_eq!(raw, "3q2+7w==");
        assert_eq!(decode_bytes(&raw).unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[tokio::test]
    async fn remove_all_clears_listed_slots() {
        let backend = MemoryStore::new();
        let storage = Storage::new(backend.clone());
        for slot in Slot::ALL {
            storage.set(slot, "x").await.unwrap();
        }
        backend.poke("unrelated", "keep");

        assert_eq!(storage.remove_all(&Slot::ALL).await, 0);
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.peek("unrelated").as_deref(), Some("keep"));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_bytes("not base64!!").is_err());
    }
}
