//! Memory bank: session-scoped key/value storage plus durable, append-only
//! named collections.
//!
//! Two implementations:
//! - [`InMemoryBank`]: everything lives in process memory (tests, one-shot runs)
//! - [`FileMemoryBank`]: collections persist as JSON arrays in
//!   `<dir>/<collection>.json`; the session store stays in memory

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use taskflow_shared::{Result, TaskflowError};

/// Key/collection storage consulted by the pipeline.
///
/// Methods take `&self`; implementations synchronize internally so a bank can
/// be shared across the pipeline and its caller.
pub trait MemoryBank: Send + Sync {
    /// Store a session-scoped value, overwriting any previous one.
    fn store_session(&self, key: &str, value: Value);

    /// Read a session-scoped value.
    fn retrieve_session(&self, key: &str) -> Option<Value>;

    /// Append `item` to the named durable collection.
    fn store_long_term(&self, collection: &str, item: Value) -> Result<()>;

    /// All items of the named collection, oldest first. Unknown collections are empty.
    fn retrieve_long_term(&self, collection: &str) -> Result<Vec<Value>>;

    /// Drop every session-scoped value.
    fn clear_session(&self);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// InMemoryBank
// ---------------------------------------------------------------------------

/// Memory bank that never touches disk.
#[derive(Debug, Default)]
pub struct InMemoryBank {
    session: Mutex<HashMap<String, Value>>,
    collections: Mutex<BTreeMap<String, Vec<Value>>>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryBank for InMemoryBank {
    fn store_session(&self, key: &str, value: Value) {
        lock(&self.session).insert(key.to_string(), value);
    }

    fn retrieve_session(&self, key: &str) -> Option<Value> {
        lock(&self.session).get(key).cloned()
    }

    fn store_long_term(&self, collection: &str, item: Value) -> Result<()> {
        validate_collection_name(collection)?;
        lock(&self.collections)
            .entry(collection.to_string())
            .or_default()
            .push(item);
        Ok(())
    }

    fn retrieve_long_term(&self, collection: &str) -> Result<Vec<Value>> {
        validate_collection_name(collection)?;
        Ok(lock(&self.collections)
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    fn clear_session(&self) {
        lock(&self.session).clear();
    }
}

// ---------------------------------------------------------------------------
// FileMemoryBank
// ---------------------------------------------------------------------------

/// Memory bank persisting collections as pretty-printed JSON files.
#[derive(Debug)]
pub struct FileMemoryBank {
    dir: PathBuf,
    session: Mutex<HashMap<String, Value>>,
    /// Serializes read-modify-write of collection files.
    write_lock: Mutex<()>,
}

impl FileMemoryBank {
    /// Open (and create if needed) a memory directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| TaskflowError::io(&dir, e))?;
        debug!(dir = %dir.display(), "opened memory bank");

        Ok(Self {
            dir,
            session: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    /// Read a collection file. Missing or corrupt files read as empty.
    fn read_collection(&self, path: &Path) -> Result<Vec<Value>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| TaskflowError::io(path, e))?;
        match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt memory collection, treating as empty");
                Ok(Vec::new())
            }
        }
    }
}

impl MemoryBank for FileMemoryBank {
    fn store_session(&self, key: &str, value: Value) {
        lock(&self.session).insert(key.to_string(), value);
    }

    fn retrieve_session(&self, key: &str) -> Option<Value> {
        lock(&self.session).get(key).cloned()
    }

    fn store_long_term(&self, collection: &str, item: Value) -> Result<()> {
        validate_collection_name(collection)?;
        let _guard = lock(&self.write_lock);

        let path = self.collection_path(collection);
        let mut items = self.read_collection(&path)?;
        items.push(item);

        let content = serde_json::to_string_pretty(&items)
            .map_err(|e| TaskflowError::Memory(format!("failed to encode {collection}: {e}")))?;
        std::fs::write(&path, content).map_err(|e| TaskflowError::io(&path, e))?;

        debug!(collection, items = items.len(), "appended to memory collection");
        Ok(())
    }

    fn retrieve_long_term(&self, collection: &str) -> Result<Vec<Value>> {
        validate_collection_name(collection)?;
        self.read_collection(&self.collection_path(collection))
    }

    fn clear_session(&self) {
        lock(&self.session).clear();
    }
}

/// Collection names become file names, so keep them to a safe charset.
fn validate_collection_name(collection: &str) -> Result<()> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(TaskflowError::Memory(format!(
            "invalid collection name '{collection}': use letters, digits, '-' or '_'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn exercise_session_store(bank: &dyn MemoryBank) {
        assert_eq!(bank.retrieve_session("document_path"), None);

        bank.store_session("document_path", json!("syllabus.pdf"));
        bank.store_session("document_path", json!("notes.md"));
        assert_eq!(bank.retrieve_session("document_path"), Some(json!("notes.md")));

        bank.clear_session();
        assert_eq!(bank.retrieve_session("document_path"), None);
    }

    #[test]
    fn in_memory_session_store() {
        exercise_session_store(&InMemoryBank::new());
    }

    #[test]
    fn in_memory_collections_append_in_order() {
        let bank = InMemoryBank::new();
        assert!(bank.retrieve_long_term("runs").expect("read").is_empty());

        bank.store_long_term("runs", json!({"n": 1})).expect("store");
        bank.store_long_term("runs", json!({"n": 2})).expect("store");
        bank.clear_session();

        let runs = bank.retrieve_long_term("runs").expect("read");
        assert_eq!(runs, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn file_bank_session_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        exercise_session_store(&FileMemoryBank::open(dir.path()).expect("open"));
    }

    #[test]
    fn file_bank_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let bank = FileMemoryBank::open(dir.path()).expect("open");
            bank.store_long_term("runs", json!({"session": "a"})).expect("store");
            bank.store_long_term("runs", json!({"session": "b"})).expect("store");
        }

        let reopened = FileMemoryBank::open(dir.path()).expect("reopen");
        let runs = reopened.retrieve_long_term("runs").expect("read");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1]["session"], "b");
        assert!(dir.path().join("runs.json").exists());
    }

    #[test]
    fn file_bank_treats_corrupt_collection_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("runs.json"), "{not json").expect("write");

        let bank = FileMemoryBank::open(dir.path()).expect("open");
        assert!(bank.retrieve_long_term("runs").expect("read").is_empty());

        bank.store_long_term("runs", json!(1)).expect("store");
        assert_eq!(bank.retrieve_long_term("runs").expect("read"), vec![json!(1)]);
    }

    #[test]
    fn collection_names_are_validated() {
        let bank = InMemoryBank::new();
        assert!(bank.store_long_term("../escape", json!(1)).is_err());
        assert!(bank.retrieve_long_term("").is_err());
        assert!(bank.store_long_term("study-runs_2", json!(1)).is_ok());
    }
}
