use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::StoreError;

/// Flat, string-keyed durable storage on the local device.
///
/// Operations are synchronous: local persistence never suspends.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One file per key under a root directory.
/// Writes go to a temp file first and are renamed into place.
pub struct FileKvStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKvStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!("Local store opened at {}", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store. Nothing survives the process; used for tests and for
/// running without a writable data directory.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// Reads a JSON blob. Missing, unreadable or corrupt blobs read as the
/// default value so a damaged local store never blocks the caller.
pub fn load_json<T: DeserializeOwned + Default>(kv: &dyn KeyValueStore, key: &str) -> T {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!("Local store read failed for '{key}': {e}");
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Discarding corrupt local blob '{key}': {e}");
        T::default()
    })
}

/// Reads a JSON blob that is about to be rewritten. Read failures are
/// errors, since saving over an unread blob would drop its contents. A
/// corrupt blob is copied to `<key>.corrupt` before reading as the default.
pub fn load_json_for_update<T: DeserializeOwned + Default>(
    kv: &dyn KeyValueStore,
    key: &str,
) -> Result<T, StoreError> {
    let Some(raw) = kv.get(key)? else {
        return Ok(T::default());
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            let aside = format!("{key}.corrupt");
            kv.set(&aside, &raw)?;
            warn!("Corrupt local blob '{key}' ({e}); kept a copy as '{aside}'");
            Ok(T::default())
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(
    kv: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    kv.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();

        assert_eq!(store.get("school_notes").unwrap(), None);
        store.set("school_notes", "[]").unwrap();
        assert_eq!(store.get("school_notes").unwrap().as_deref(), Some("[]"));

        store.remove("school_notes").unwrap();
        assert_eq!(store.get("school_notes").unwrap(), None);
        // removing twice is fine
        store.remove("school_notes").unwrap();
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileKvStore::open(dir.path()).unwrap();
            store.set("plc_chat_plc-math", "[1]").unwrap();
        }
        let reopened = FileKvStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get("plc_chat_plc-math").unwrap().as_deref(),
            Some("[1]")
        );
    }

    #[test]
    fn test_file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        store.set("../escape/attempt", "x").unwrap();
        assert!(dir.path().join(".._escape_attempt.json").exists());
    }

    #[test]
    fn test_load_json_corrupt_blob_reads_default() {
        let store = MemoryKvStore::default();
        store.set("school_notes", "{not json").unwrap();
        let loaded: Vec<String> = load_json(&store, "school_notes");
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_corrupt_blob_is_set_aside_before_rewrite() {
        let store = MemoryKvStore::default();
        store.set("school_notes", "{not json").unwrap();
        let loaded: Vec<String> = load_json_for_update(&store, "school_notes").unwrap();
        assert!(loaded.is_empty());
        assert_eq!(
            store.get("school_notes.corrupt").unwrap().as_deref(),
            Some("{not json")
        );
    }

    struct UnreadableKv;

    impl KeyValueStore for UnreadableKv {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Local(std::io::Error::other("disk gone")))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Ok(())
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_read_failure_blocks_rewrite() {
        let loaded: Result<Vec<String>, _> = load_json_for_update(&UnreadableKv, "school_notes");
        assert!(matches!(loaded, Err(StoreError::Local(_))));
        // plain reads still degrade to empty
        let lenient: Vec<String> = load_json(&UnreadableKv, "school_notes");
        assert!(lenient.is_empty());
    }

    #[test]
    fn test_save_then_load_json() {
        let store = MemoryKvStore::default();
        save_json(&store, "k", &vec!["a".to_string(), "b".to_string()]).unwrap();
        let loaded: Vec<String> = load_json(&store, "k");
        assert_eq!(loaded, vec!["a", "b"]);
    }
}
