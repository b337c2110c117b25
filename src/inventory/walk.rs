// SPDX-License-Identifier: GPL-3.0-only

//! Inventory check across collections
//!
//! A walk visits the user's collections oldest first. Checking one
//! collection chains into the next until all have been visited. The walk
//! itself is never stored; only the `found` flags on items are.

use super::{Collection, Inventory, InventoryProgress, Item};
use crate::auth::User;
use crate::store::StoreResult;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct InventoryWalk {
    user: User,
    collections: Vec<Collection>,
    position: usize,
}

impl InventoryWalk {
    /// Start a walk over every collection of `user`
    pub fn start(inventory: &Inventory, user: &User) -> StoreResult<Self> {
        let collections = inventory.get_collections(user)?;
        debug!(collections = collections.len(), "Starting inventory walk");
        Ok(Self {
            user: user.clone(),
            collections,
            position: 0,
        })
    }

    /// Collection currently being checked
    pub fn current(&self) -> Option<&Collection> {
        self.collections.get(self.position)
    }

    /// Items of the current collection
    pub fn current_items(&self, inventory: &Inventory) -> StoreResult<Vec<Item>> {
        match self.current() {
            Some(collection) => inventory.get_items_by_collection(&self.user, &collection.id),
            None => Ok(Vec::new()),
        }
    }

    pub fn current_progress(&self, inventory: &Inventory) -> StoreResult<InventoryProgress> {
        match self.current() {
            Some(collection) => inventory.inventory_progress(&self.user, &collection.id),
            None => Ok(InventoryProgress::default()),
        }
    }

    /// Move on to the next collection
    ///
    /// Returns `None` once every collection has been visited.
    pub fn next_collection(&mut self) -> Option<&Collection> {
        if self.position < self.collections.len() {
            self.position += 1;
        }
        self.current()
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.collections.len()
    }

    /// (visited, total) collections
    pub fn position(&self) -> (usize, usize) {
        (self.position.min(self.collections.len()), self.collections.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_walk_chains_through_collections_in_order() {
        let inventory = Inventory::new(Arc::new(MemoryStore::new()));
        let user = User {
            uid: "u1".into(),
            email: "u1@example.com".into(),
        };
        let first = inventory.add_collection(&user, "First").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        inventory.add_collection(&user, "Second").unwrap();
        inventory.add_item(&user, &first, "Thing", "", None).unwrap();

        let mut walk = InventoryWalk::start(&inventory, &user).unwrap();
        assert_eq!(walk.current().map(|c| c.name.as_str()), Some("First"));
        assert_eq!(walk.current_items(&inventory).unwrap().len(), 1);
        assert_eq!(walk.current_progress(&inventory).unwrap().total, 1);

        assert_eq!(
            walk.next_collection().map(|c| c.name.clone()),
            Some("Second".to_string())
        );
        assert!(walk.next_collection().is_none());
        assert!(walk.is_finished());
        assert!(walk.next_collection().is_none());
        assert_eq!(walk.position(), (2, 2));
    }
}
