use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::error::StorageResult;
use super::types::PersistedState;
use super::{StateStorage, decode_state, encode_state, validate_namespace};

/// In-process storage. Payloads still go through the JSON envelope so
/// serialization bugs surface the same way they would on disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_payload(&self, namespace: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .cloned()
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self, namespace: &str) -> StorageResult<Option<PersistedState>> {
        validate_namespace(namespace, "memory-load-namespace")?;
        self.raw_payload(namespace)
            .map(|payload| decode_state(namespace, &payload))
            .transpose()
    }

    fn save(&self, namespace: &str, state: &PersistedState) -> StorageResult<()> {
        validate_namespace(namespace, "memory-save-namespace")?;
        let payload = encode_state(namespace, state)?;
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(namespace.to_string(), payload);
        Ok(())
    }

    fn clear(&self, namespace: &str) -> StorageResult<()> {
        validate_namespace(namespace, "memory-clear-namespace")?;
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(namespace);
        Ok(())
    }
}
