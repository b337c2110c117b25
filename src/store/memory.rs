// SPDX-License-Identifier: GPL-3.0-only

//! In-memory document store

use super::{Document, DocumentStore, Fields, Query, StoreResult};
use crate::errors::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Documents by logical collection, each list in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct Collections(BTreeMap<String, Vec<Document>>);

impl Collections {
    pub(crate) fn insert(&mut self, collection: &str, fields: Fields) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.0
            .entry(collection.to_string())
            .or_default()
            .push(Document {
                id: id.clone(),
                fields,
            });
        id
    }

    pub(crate) fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.0.get(collection)?.iter().find(|d| d.id == id).cloned()
    }

    pub(crate) fn query(&self, query: &Query) -> Vec<Document> {
        match self.0.get(&query.collection) {
            Some(documents) => query.apply(documents),
            None => Vec::new(),
        }
    }

    pub(crate) fn update(&mut self, collection: &str, id: &str, patch: Fields) -> StoreResult<()> {
        let document = self
            .0
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        document.fields.extend(patch);
        Ok(())
    }

    /// Returns whether a document was removed
    pub(crate) fn delete(&mut self, collection: &str, id: &str) -> bool {
        let Some(documents) = self.0.get_mut(collection) else {
            return false;
        };
        let before = documents.len();
        documents.retain(|d| d.id != id);
        documents.len() != before
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("store lock poisoned".into()))
}

/// Document store held entirely in memory
///
/// Contents are lost when the store is dropped. Used by tests and as the
/// store behind `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let id = lock(&self.collections)?.insert(collection, fields);
        debug!(collection, id = %id, "Inserted document");
        Ok(id)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        Ok(lock(&self.collections)?.get(collection, id))
    }

    fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        Ok(lock(&self.collections)?.query(query))
    }

    fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreResult<()> {
        lock(&self.collections)?.update(collection, id, patch)
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let removed = lock(&self.collections)?.delete(collection, id);
        debug!(collection, id, removed, "Deleted document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_get_update_delete() {
        let store = MemoryStore::new();
        let id = store
            .insert("items", fields(json!({"name": "Stamp", "found": false})))
            .unwrap();

        store
            .update("items", &id, fields(json!({"found": true})))
            .unwrap();
        let doc = store.get("items", &id).unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("Stamp")));
        assert_eq!(doc.get("found"), Some(&json!(true)));

        store.delete("items", &id).unwrap();
        assert!(store.get("items", &id).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update("items", "nope", Fields::new()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = MemoryStore::new();
        assert!(store.delete("items", "nope").is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let store = MemoryStore::new();
        let a = store.insert("c", Fields::new()).unwrap();
        let b = store.insert("c", Fields::new()).unwrap();
        assert_ne!(a, b);
    }
}
