// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for collection and item lifecycles

use curio::auth::User;
use curio::constants::collections::{COLLECTIONS, ITEMS};
use curio::errors::StoreError;
use curio::inventory::Inventory;
use curio::store::{
    Document, DocumentStore, Fields, JsonFileStore, MemoryStore, Query, StoreResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory store whose n-th item delete fails (0 = never)
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_item_delete_at: AtomicUsize,
    item_deletes: AtomicUsize,
}

impl DocumentStore for FlakyStore {
    fn insert(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        self.inner.insert(collection, fields)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.inner.get(collection, id)
    }

    fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.inner.query(query)
    }

    fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreResult<()> {
        self.inner.update(collection, id, patch)
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        if collection == ITEMS {
            let count = self.item_deletes.fetch_add(1, Ordering::SeqCst) + 1;
            if count == self.fail_item_delete_at.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("simulated outage".into()));
            }
        }
        self.inner.delete(collection, id)
    }
}

fn user(uid: &str) -> User {
    User {
        uid: uid.into(),
        email: format!("{}@example.com", uid),
    }
}

fn count(store: &dyn DocumentStore, collection: &str) -> usize {
    store.query(&Query::new(collection)).unwrap().len()
}

#[test]
fn test_delete_collection_removes_items_and_collection() {
    let store = Arc::new(FlakyStore::default());
    let inventory = Inventory::new(store.clone());
    let owner = user("u1");

    let collection = inventory.add_collection(&owner, "Coins").unwrap();
    for name in ["Penny", "Nickel", "Dime"] {
        inventory
            .add_item(&owner, &collection, name, "", None)
            .unwrap();
    }
    assert_eq!(count(store.as_ref(), COLLECTIONS) + count(store.as_ref(), ITEMS), 4);

    assert_eq!(inventory.delete_collection(&owner, &collection).unwrap(), 3);
    assert_eq!(count(store.as_ref(), COLLECTIONS), 0);
    assert_eq!(count(store.as_ref(), ITEMS), 0);
}

#[test]
fn test_failed_item_delete_keeps_collection() {
    let store = Arc::new(FlakyStore::default());
    store.fail_item_delete_at.store(2, Ordering::SeqCst);
    let inventory = Inventory::new(store.clone());
    let owner = user("u1");

    let collection = inventory.add_collection(&owner, "Stamps").unwrap();
    for name in ["Blue", "Red", "Green"] {
        inventory
            .add_item(&owner, &collection, name, "", None)
            .unwrap();
    }

    assert!(inventory.delete_collection(&owner, &collection).is_err());
    assert!(inventory.get_collection(&owner, &collection).unwrap().is_some());
    assert_eq!(
        inventory
            .get_items_by_collection(&owner, &collection)
            .unwrap()
            .len(),
        2
    );

    // Retrying once the store recovers finishes the job
    store.fail_item_delete_at.store(0, Ordering::SeqCst);
    assert_eq!(inventory.delete_collection(&owner, &collection).unwrap(), 2);
    assert!(inventory.get_collection(&owner, &collection).unwrap().is_none());
}

#[test]
fn test_cannot_delete_someone_elses_collection() {
    let inventory = Inventory::new(Arc::new(MemoryStore::new()));
    let owner = user("u1");
    let intruder = user("u2");

    let collection = inventory.add_collection(&owner, "Mine").unwrap();
    inventory
        .add_item(&owner, &collection, "Thing", "", None)
        .unwrap();

    assert!(matches!(
        inventory.delete_collection(&intruder, &collection),
        Err(StoreError::NotFound { .. })
    ));
    assert!(inventory.get_collection(&owner, &collection).unwrap().is_some());
    assert!(inventory.get_collections(&intruder).unwrap().is_empty());
}

#[test]
fn test_cannot_change_someone_elses_documents() {
    let inventory = Inventory::new(Arc::new(MemoryStore::new()));
    let owner = user("u1");
    let intruder = user("u2");

    let collection = inventory.add_collection(&owner, "Mine").unwrap();
    let item = inventory
        .add_item(&owner, &collection, "Thing", "", None)
        .unwrap();

    assert!(matches!(
        inventory.update_collection(&intruder, &collection, "Taken"),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        inventory.update_item(&intruder, &item, "Taken", "", None),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        inventory.set_item_found(&intruder, &item, true),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        inventory.delete_item(&intruder, &item),
        Err(StoreError::NotFound { .. })
    ));
    assert!(inventory.get_item(&intruder, &item).unwrap().is_none());

    let collection = inventory.get_collection(&owner, &collection).unwrap().unwrap();
    assert_eq!(collection.name, "Mine");
    let item = inventory.get_item(&owner, &item).unwrap().unwrap();
    assert_eq!(item.name, "Thing");
    assert!(!item.is_found());
}

#[test]
fn test_json_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let owner = user("u1");

    let (collection, item) = {
        let inventory = Inventory::new(Arc::new(JsonFileStore::open(&path).unwrap()));
        let collection = inventory.add_collection(&owner, "  Records ").unwrap();
        let item = inventory
            .add_item(&owner, &collection, "Blue Train", "Coltrane", None)
            .unwrap();
        inventory.set_item_found(&owner, &item, true).unwrap();
        (collection, item)
    };

    let inventory = Inventory::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    let collections = inventory.get_collections(&owner).unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].id, collection);
    assert_eq!(collections[0].name, "Records");

    let stored = inventory.get_item(&owner, &item).unwrap().unwrap();
    assert_eq!(stored.description, "Coltrane");
    assert!(stored.is_found());

    let progress = inventory.inventory_progress(&owner, &collection).unwrap();
    assert!(progress.is_complete());
    assert_eq!(progress.to_string(), "1/1 found");
}
