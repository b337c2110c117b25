// SPDX-License-Identifier: GPL-3.0-only

//! Collections and items on top of the document store
//!
//! Every query is scoped by the owning user's id, and a document owned by
//! someone else reads as missing. Deleting a collection
//! cascades to its items one document at a time; the store has no
//! transactions, so a failed cascade is reported and the collection is kept,
//! and [`Inventory::sweep_orphaned_items`] cleans up whatever a partial
//! cascade or an older client left behind.

pub mod models;
pub mod walk;

pub use models::{Collection, InventoryProgress, Item, Record};
pub use walk::InventoryWalk;

use crate::auth::User;
use crate::constants::collections::{COLLECTIONS, ITEMS};
use crate::errors::StoreError;
use crate::store::{Direction, DocumentStore, Fields, Query, StoreResult};
use chrono::Utc;
use models::fields;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Reject names that are empty after trimming
fn clean_name(name: &str, what: &str) -> StoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Invalid(format!("{} name cannot be empty.", what)));
    }
    Ok(trimmed.to_string())
}

/// Typed inventory operations
#[derive(Clone)]
pub struct Inventory {
    store: Arc<dyn DocumentStore>,
}

impl Inventory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Refuse a document that belongs to another user
    ///
    /// Returns whether the document exists.
    fn check_owner(&self, user: &User, collection: &str, id: &str) -> StoreResult<bool> {
        let Some(document) = self.store.get(collection, id)? else {
            return Ok(false);
        };
        let owner = document.get(fields::USER_ID).and_then(Value::as_str);
        if owner != Some(user.uid.as_str()) {
            warn!(collection, id, "Refusing access to a document owned by another user");
            return Err(not_found(collection, id));
        }
        Ok(true)
    }

    /// Like [`Self::check_owner`], but a missing document is an error too
    fn require_owned(&self, user: &User, collection: &str, id: &str) -> StoreResult<()> {
        if self.check_owner(user, collection, id)? {
            Ok(())
        } else {
            Err(not_found(collection, id))
        }
    }

    // --- Collections ---

    pub fn add_collection(&self, user: &User, name: &str) -> StoreResult<String> {
        let collection = Collection {
            id: String::new(),
            user_id: user.uid.clone(),
            name: clean_name(name, "Collection")?,
            created_at: Utc::now(),
        };
        let id = self
            .store
            .insert(COLLECTIONS, collection.to_document_fields()?)?;
        info!(id = %id, name = %collection.name, "Added collection");
        Ok(id)
    }

    /// The user's collections, oldest first
    pub fn get_collections(&self, user: &User) -> StoreResult<Vec<Collection>> {
        let query = Query::new(COLLECTIONS)
            .where_eq(fields::USER_ID, user.uid.as_str())
            .order_by(fields::CREATED_AT, Direction::Ascending);
        self.store
            .query(&query)?
            .iter()
            .map(Collection::from_document)
            .collect()
    }

    /// A collection, if it exists and belongs to `user`
    pub fn get_collection(&self, user: &User, id: &str) -> StoreResult<Option<Collection>> {
        let Some(document) = self.store.get(COLLECTIONS, id)? else {
            return Ok(None);
        };
        let collection = Collection::from_document(&document)?;
        Ok((collection.user_id == user.uid).then_some(collection))
    }

    pub fn update_collection(&self, user: &User, id: &str, name: &str) -> StoreResult<()> {
        self.require_owned(user, COLLECTIONS, id)?;
        let mut patch = Fields::new();
        patch.insert(fields::NAME.into(), clean_name(name, "Collection")?.into());
        self.store.update(COLLECTIONS, id, patch)?;
        info!(id, "Updated collection");
        Ok(())
    }

    /// Delete a collection and every item the user has in it
    ///
    /// Items go first, one at a time. If any item delete fails the cascade
    /// stops and the collection document stays, so the user can retry;
    /// items already deleted stay deleted. A collection owned by someone
    /// else is treated as missing.
    ///
    /// Returns the number of items deleted.
    pub fn delete_collection(&self, user: &User, collection_id: &str) -> StoreResult<usize> {
        self.check_owner(user, COLLECTIONS, collection_id)?;

        let items = self.items_query(user, collection_id);
        let mut deleted = 0;
        for document in self.store.query(&items)? {
            if let Err(e) = self.store.delete(ITEMS, &document.id) {
                error!(
                    collection_id,
                    item_id = %document.id,
                    deleted,
                    error = %e,
                    "Item delete failed, keeping collection"
                );
                return Err(e);
            }
            deleted += 1;
        }

        self.store.delete(COLLECTIONS, collection_id)?;
        info!(collection_id, items = deleted, "Deleted collection");
        Ok(deleted)
    }

    /// Delete the user's items whose collection no longer exists
    ///
    /// Returns the number of items removed.
    pub fn sweep_orphaned_items(&self, user: &User) -> StoreResult<usize> {
        let live: HashSet<String> = self
            .get_collections(user)?
            .into_iter()
            .map(|collection| collection.id)
            .collect();

        let query = Query::new(ITEMS).where_eq(fields::USER_ID, user.uid.as_str());
        let mut removed = 0;
        for document in self.store.query(&query)? {
            let parent = document.get(fields::COLLECTION_ID).and_then(Value::as_str);
            if parent.is_some_and(|id| live.contains(id)) {
                continue;
            }
            self.store.delete(ITEMS, &document.id)?;
            removed += 1;
        }

        if removed > 0 {
            info!(removed, "Swept orphaned items");
        }
        Ok(removed)
    }

    // --- Items ---

    fn items_query(&self, user: &User, collection_id: &str) -> Query {
        Query::new(ITEMS)
            .where_eq(fields::USER_ID, user.uid.as_str())
            .where_eq(fields::COLLECTION_ID, collection_id)
    }

    pub fn add_item(
        &self,
        user: &User,
        collection_id: &str,
        name: &str,
        description: &str,
        image_data: Option<&str>,
    ) -> StoreResult<String> {
        let item = Item {
            id: String::new(),
            user_id: user.uid.clone(),
            collection_id: collection_id.to_string(),
            name: clean_name(name, "Item")?,
            description: description.trim().to_string(),
            image_data: image_data.unwrap_or_default().to_string(),
            found: None,
            created_at: Utc::now(),
        };
        let id = self.store.insert(ITEMS, item.to_document_fields()?)?;
        info!(id = %id, collection_id, name = %item.name, "Added item");
        Ok(id)
    }

    /// Items of one collection, oldest first
    pub fn get_items_by_collection(
        &self,
        user: &User,
        collection_id: &str,
    ) -> StoreResult<Vec<Item>> {
        let query = self
            .items_query(user, collection_id)
            .order_by(fields::CREATED_AT, Direction::Ascending);
        self.store
            .query(&query)?
            .iter()
            .map(Item::from_document)
            .collect()
    }

    /// An item, if it exists and belongs to `user`
    pub fn get_item(&self, user: &User, id: &str) -> StoreResult<Option<Item>> {
        let Some(document) = self.store.get(ITEMS, id)? else {
            return Ok(None);
        };
        let item = Item::from_document(&document)?;
        Ok((item.user_id == user.uid).then_some(item))
    }

    /// Image of the oldest item in a collection, used as its cover
    pub fn first_item_image(&self, user: &User, collection_id: &str) -> StoreResult<Option<String>> {
        let query = self
            .items_query(user, collection_id)
            .order_by(fields::CREATED_AT, Direction::Ascending)
            .limit(1);

        Ok(self
            .store
            .query(&query)?
            .first()
            .and_then(|doc| doc.get(fields::IMAGE_DATA))
            .and_then(Value::as_str)
            .filter(|data| !data.is_empty())
            .map(str::to_string))
    }

    /// Replace an item's name, description and image
    ///
    /// `None` clears the image.
    pub fn update_item(
        &self,
        user: &User,
        id: &str,
        name: &str,
        description: &str,
        image_data: Option<&str>,
    ) -> StoreResult<()> {
        self.require_owned(user, ITEMS, id)?;
        let mut patch = Fields::new();
        patch.insert(fields::NAME.into(), clean_name(name, "Item")?.into());
        patch.insert(fields::DESCRIPTION.into(), description.trim().into());
        patch.insert(
            fields::IMAGE_DATA.into(),
            image_data.unwrap_or_default().into(),
        );
        self.store.update(ITEMS, id, patch)?;
        info!(id, "Updated item");
        Ok(())
    }

    /// Delete an item; deleting a missing item is not an error
    pub fn delete_item(&self, user: &User, id: &str) -> StoreResult<()> {
        self.check_owner(user, ITEMS, id)?;
        self.store.delete(ITEMS, id)?;
        info!(id, "Deleted item");
        Ok(())
    }

    // --- Inventory check ---

    pub fn set_item_found(&self, user: &User, id: &str, found: bool) -> StoreResult<()> {
        self.require_owned(user, ITEMS, id)?;
        let mut patch = Fields::new();
        patch.insert(fields::FOUND.into(), found.into());
        self.store.update(ITEMS, id, patch)
    }

    /// Mark every item of a collection as not found
    ///
    /// Returns the number of items touched.
    pub fn reset_found(&self, user: &User, collection_id: &str) -> StoreResult<usize> {
        let items = self.store.query(&self.items_query(user, collection_id))?;
        for document in &items {
            self.set_item_found(user, &document.id, false)?;
        }
        Ok(items.len())
    }

    pub fn inventory_progress(
        &self,
        user: &User,
        collection_id: &str,
    ) -> StoreResult<InventoryProgress> {
        let items = self.store.query(&self.items_query(user, collection_id))?;
        let found = items
            .iter()
            .filter(|doc| doc.get(fields::FOUND).and_then(Value::as_bool) == Some(true))
            .count();
        Ok(InventoryProgress {
            found,
            total: items.len(),
        })
    }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.into(),
        id: id.into(),
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory").finish_non_exhaustive()
    }
}
