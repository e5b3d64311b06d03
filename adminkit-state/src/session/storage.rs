//! Key-value stores backing the persisted session slot

use adminkit_core::{ConsoleError, ConsoleResult, KeyValueStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// In-process store; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> ConsoleResult<Option<String>> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> ConsoleResult<()> {
        self.slots.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ConsoleResult<()> {
        self.slots.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> ConsoleResult<()> {
        self.slots.lock().clear();
        Ok(())
    }
}

/// One JSON file per slot inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    storage_dir: PathBuf,
}

impl FileStore {
    /// Create the store, creating the directory if it doesn't exist
    pub fn new<P: AsRef<Path>>(storage_dir: P) -> ConsoleResult<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        info!("Session storage initialized at: {}", storage_dir.display());

        Ok(Self { storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn slot_path(&self, key: &str) -> ConsoleResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ConsoleError::storage(
                format!("Invalid slot name: '{}'", key),
                "slot_path",
                None,
            ));
        }

        Ok(self.storage_dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> ConsoleResult<Option<String>> {
        let slot_file = self.slot_path(key)?;
        if !slot_file.exists() {
            return Ok(None);
        }

        let data = std::fs::read_to_string(&slot_file)?;
        debug!("Loaded slot {} from {}", key, slot_file.display());
        Ok(Some(data))
    }

    fn save(&self, key: &str, value: &str) -> ConsoleResult<()> {
        let slot_file = self.slot_path(key)?;

        // Write then rename so a crash never leaves a truncated slot behind
        let partial = slot_file.with_extension("json.partial");
        std::fs::write(&partial, value)?;
        std::fs::rename(&partial, &slot_file)?;

        debug!("Saved slot {} to {}", key, slot_file.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> ConsoleResult<()> {
        let slot_file = self.slot_path(key)?;
        if slot_file.exists() {
            std::fs::remove_file(&slot_file)?;
            debug!("Deleted slot file: {}", slot_file.display());
        }
        Ok(())
    }

    fn clear(&self) -> ConsoleResult<()> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.storage_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }

        info!("Cleared {} slots from {}", removed, self.storage_dir.display());
        Ok(())
    }
}
