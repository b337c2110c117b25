// SPDX-License-Identifier: GPL-3.0-only

//! Document store persisted to a single JSON file
//!
//! The whole store is loaded at open and rewritten after every mutation. The
//! file is replaced through a sibling temp file and a rename, so a crash
//! mid-write leaves the previous contents intact.

use super::memory::{Collections, lock};
use super::{Document, DocumentStore, Fields, Query, StoreResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    collections: Mutex<Collections>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty when the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let collections = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text)?
        } else {
            debug!(path = %path.display(), "Starting new document store");
            Collections::default()
        };

        info!(path = %path.display(), "Opened document store");
        Ok(Self {
            path,
            collections: Mutex::new(collections),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, collections: &Collections) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(collections)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DocumentStore for JsonFileStore {
    fn insert(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let mut collections = lock(&self.collections)?;
        let id = collections.insert(collection, fields);
        if let Err(e) = self.persist(&collections) {
            collections.delete(collection, &id);
            return Err(e);
        }
        Ok(id)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        Ok(lock(&self.collections)?.get(collection, id))
    }

    fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        Ok(lock(&self.collections)?.query(query))
    }

    fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreResult<()> {
        let mut collections = lock(&self.collections)?;
        let previous = collections.clone();
        collections.update(collection, id, patch)?;
        if let Err(e) = self.persist(&collections) {
            *collections = previous;
            return Err(e);
        }
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut collections = lock(&self.collections)?;
        let previous = collections.clone();
        if !collections.delete(collection, id) {
            return Ok(());
        }

        if let Err(e) = self.persist(&collections) {
            *collections = previous;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reopen_sees_previous_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let id = {
            let store = JsonFileStore::open(&path).unwrap();
            let fields = json!({"name": "Coins"}).as_object().cloned().unwrap();
            store.insert("collections", fields).unwrap()
        };

        let store = JsonFileStore::open(&path).unwrap();
        let doc = store.get("collections", &id).unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("Coins")));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(JsonFileStore::open(&path).is_err());
    }
}
