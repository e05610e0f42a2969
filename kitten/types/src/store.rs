/*!
    Origin-scoped key-value storage.
*/

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/**
    Synchronous string key-value store, shared by every tab of an origin.

    Writes are full overwrites of a key. There is no read-modify-write
    primitive; callers that merge must re-read first.
*/
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key` if present.
    fn remove(&self, key: &str) -> Result<()>;
}

/**
    Read and decode a JSON value.

    Missing keys and malformed JSON both read as `None`; the latter is
    logged since it usually means an older or hand-edited value.
*/
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("[store] Ignoring malformed value for {key}: {e}");
            None
        }
    }
}

/**
    Encode a value as JSON and store it.
*/
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| Error::json(key, e))?;
    store.set(key, &raw)
}

/**
    In-memory store, used for tests and for headless sessions.
*/
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Number of stored keys.
    */
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

static_assertions::assert_impl_all!(MemoryStore: Send, Sync, KeyValueStore);

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        volume: u8,
    }

    #[test]
    fn memory_store_basics() {
        let store = MemoryStore::new();
        assert!(store.get("a").is_none());

        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").as_deref(), Some("2"));
        assert_eq!(store.len(), 1);

        store.remove("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn json_round_trip() {
        let store = MemoryStore::new();
        write_json(&store, "prefs", &Prefs { volume: 7 }).unwrap();
        assert_eq!(read_json::<Prefs>(&store, "prefs"), Some(Prefs { volume: 7 }));
    }

    #[test]
    fn malformed_json_reads_as_missing() {
        let store = MemoryStore::new();
        store.set("prefs", "{not json").unwrap();
        assert_eq!(read_json::<Prefs>(&store, "prefs"), None);
    }
}
