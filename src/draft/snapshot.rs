//! Durable key-value storage for draft snapshots.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::SnapshotError;

/// Synchronous key-value store for JSON snapshots.
///
/// Reads happen once at startup; a write follows every draft mutation.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, SnapshotError>;

    fn save(&self, key: &str, json: &str) -> Result<(), SnapshotError>;

    fn clear(&self, key: &str) -> Result<(), SnapshotError>;
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        let entries = self.entries.lock().expect("Snapshot mutex poisoned");
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, json: &str) -> Result<(), SnapshotError> {
        let mut entries = self.entries.lock().expect("Snapshot mutex poisoned");
        entries.insert(key.to_string(), json.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        let mut entries = self.entries.lock().expect("Snapshot mutex poisoned");
        entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a data directory.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Snapshot store opened");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, json: &str) -> Result<(), SnapshotError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySnapshotStore::new();
        assert!(store.load("draft").unwrap().is_none());
        store.save("draft", "{\"a\":1}").unwrap();
        assert_eq!(store.load("draft").unwrap().as_deref(), Some("{\"a\":1}"));
        store.clear("draft").unwrap();
        assert!(store.load("draft").unwrap().is_none());
    }

    #[test]
    fn file_store_overwrites_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path().join("snapshots")).unwrap();

        store.save("property_draft", "{\"v\":1}").unwrap();
        store.save("property_draft", "{\"v\":2}").unwrap();
        assert_eq!(
            store.load("property_draft").unwrap().as_deref(),
            Some("{\"v\":2}")
        );
        assert!(!dir.path().join("snapshots/property_draft.json.tmp").exists());

        store.clear("property_draft").unwrap();
        store.clear("property_draft").unwrap();
        assert!(store.load("property_draft").unwrap().is_none());
    }

    #[test]
    fn file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        store.save("../escape", "{}").unwrap();
        assert!(dir.path().join("___escape.json").exists());
    }
}
