// Key-value stores backing chain persistence

use super::PersistenceError;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// String key to string value storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
    /// Remove every key
    fn clear(&self) -> Result<(), PersistenceError>;
    fn keys(&self) -> Result<Vec<String>, PersistenceError>;
}

/// In-memory store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.entries.borrow_mut().clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

/// Store kept in a JSON object file, rewritten on every change
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is reported as an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        log::debug!("Opened store {} ({} keys)", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&*self.entries.borrow())?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let removed = self.entries.borrow_mut().remove(key).is_some();
        if removed {
            self.flush()?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.entries.borrow_mut().clear();
        self.flush()
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}
