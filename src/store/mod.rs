// SPDX-License-Identifier: GPL-3.0-only

//! Document store abstraction
//!
//! Schemaless JSON documents grouped in named logical collections. The store
//! knows nothing about collections of things or items; the typed view lives
//! in [`crate::inventory`].
//!
//! Queries support what the inventory needs and nothing more: equality
//! filters, one order-by field and a limit.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::errors::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Document body
pub type Fields = serde_json::Map<String, Value>;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Deserialize the body into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Serialize a typed value into a document body
pub fn to_fields<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Invalid(format!(
            "documents must be objects, got {}",
            other
        ))),
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Query over one logical collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Keep documents whose `field` equals `value`
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }

    /// Filter, sort and truncate documents in insertion order
    ///
    /// The sort is stable: documents with equal keys keep insertion order.
    pub fn apply<'a>(&self, documents: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.matches(doc))
            .cloned()
            .collect();

        if let Some((field, direction)) = &self.order_by {
            matched.sort_by(|a, b| {
                let ordering = compare_values(a.get(field), b.get(field));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Total order over JSON values used for sorting
///
/// Missing < null < bool < number < string; arrays and objects sort last and
/// compare equal among themselves.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .unwrap_or(f64::NAN)
                    .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Persistence collaborator
///
/// Implementations must be safe to share between threads. Every operation is
/// independent; there are no multi-document transactions.
pub trait DocumentStore: Send + Sync {
    /// Add a document and return its generated id
    fn insert(&self, collection: &str, fields: Fields) -> StoreResult<String>;

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Merge `patch` into an existing document
    ///
    /// Fails with [`StoreError::NotFound`] when the document does not exist.
    fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreResult<()>;

    /// Remove a document; removing a missing document is not an error
    fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document {
            id: id.into(),
            fields: value.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_query_filters_orders_and_limits() {
        let docs = vec![
            doc("a", json!({"userId": "u1", "createdAt": 30})),
            doc("b", json!({"userId": "u2", "createdAt": 10})),
            doc("c", json!({"userId": "u1", "createdAt": 20})),
            doc("d", json!({"userId": "u1", "createdAt": 40})),
        ];

        let query = Query::new("items")
            .where_eq("userId", "u1")
            .order_by("createdAt", Direction::Ascending)
            .limit(2);
        let ids: Vec<String> = query.apply(&docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn test_descending_sort_is_stable_for_ties() {
        let docs = vec![
            doc("a", json!({"n": 1})),
            doc("b", json!({"n": 2})),
            doc("c", json!({"n": 2})),
        ];
        let query = Query::new("x").order_by("n", Direction::Descending);
        let ids: Vec<String> = query.apply(&docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_missing_fields_sort_first() {
        assert_eq!(
            compare_values(None, Some(&json!("x"))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(Some(&json!(2.5)), Some(&json!(2))),
            Ordering::Greater
        );
    }

    #[test]
    fn test_to_fields_rejects_non_objects() {
        assert!(matches!(to_fields(&3), Err(StoreError::Invalid(_))));
    }
}
