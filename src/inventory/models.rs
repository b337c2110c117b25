// SPDX-License-Identifier: GPL-3.0-only

//! Typed documents of the inventory

use crate::store::{Document, Fields, StoreResult, to_fields};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored field names used in queries
pub mod fields {
    pub const USER_ID: &str = "userId";
    pub const COLLECTION_ID: &str = "collectionId";
    pub const CREATED_AT: &str = "createdAt";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const IMAGE_DATA: &str = "imageData";
    pub const FOUND: &str = "found";
}

/// A named group of items owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(skip)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// One thing in a collection
///
/// `image_data` holds a data URL, or an empty string when the item has no
/// picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(skip)]
    pub id: String,
    pub user_id: String,
    pub collection_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<bool>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn image(&self) -> Option<&str> {
        (!self.image_data.is_empty()).then_some(self.image_data.as_str())
    }

    /// Items never marked count as not found
    pub fn is_found(&self) -> bool {
        self.found.unwrap_or(false)
    }
}

/// Conversion between typed records and store documents
pub trait Record: Sized {
    fn from_document(document: &Document) -> StoreResult<Self>;

    fn to_document_fields(&self) -> StoreResult<Fields>;
}

impl Record for Collection {
    fn from_document(document: &Document) -> StoreResult<Self> {
        let mut collection: Collection = document.decode()?;
        collection.id = document.id.clone();
        Ok(collection)
    }

    fn to_document_fields(&self) -> StoreResult<Fields> {
        to_fields(self)
    }
}

impl Record for Item {
    fn from_document(document: &Document) -> StoreResult<Self> {
        let mut item: Item = document.decode()?;
        item.id = document.id.clone();
        Ok(item)
    }

    fn to_document_fields(&self) -> StoreResult<Fields> {
        to_fields(self)
    }
}

/// Found/total counts for one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InventoryProgress {
    pub found: usize,
    pub total: usize,
}

impl InventoryProgress {
    pub fn is_complete(&self) -> bool {
        self.found == self.total
    }

    pub fn missing(&self) -> usize {
        self.total - self.found
    }
}

impl std::fmt::Display for InventoryProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} found", self.found, self.total)
    }
}
