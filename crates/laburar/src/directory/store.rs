//! Seam over the remote document store that holds listings.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Collection holding every listing document.
pub const LISTINGS_COLLECTION: &str = "services";

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Server-side predicate pushed down to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Equals { field: String, value: Value },
    ArrayContains { field: String, value: Value },
}

impl FieldFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            FieldFilter::Equals { field, value } => fields.get(field) == Some(value),
            FieldFilter::ArrayContains { field, value } => fields
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Create/read/merge access to a document collection. There is no physical delete.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a new document and return its generated id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Overwrite the given fields, leaving every other field untouched.
    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Documents matching every filter, in insertion order.
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, StoreError>;
}

#[derive(Default)]
struct Collection {
    order: Vec<String>,
    documents: HashMap<String, Fields>,
}

/// Insertion-ordered store backing local runs and tests.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|collections| {
                collections
                    .get(collection)
                    .map_or(0, |collection| collection.order.len())
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("document store lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let target = collections.entry(collection.to_string()).or_default();

        let id = Uuid::new_v4().simple().to_string();
        target.order.push(id.clone());
        target.documents.insert(id.clone(), fields);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections
            .get(collection)
            .and_then(|target| target.documents.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let existing = collections
            .get_mut(collection)
            .and_then(|target| target.documents.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in fields {
            existing.insert(key, value);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let Some(target) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(target
            .order
            .iter()
            .filter_map(|id| target.documents.get(id).map(|fields| (id, fields)))
            .filter(|(_, fields)| filters.iter().all(|filter| filter.matches(fields)))
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn merge_keeps_untouched_fields() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .add("services", fields(json!({ "name": "Ana", "city": "Rosario" })))
            .await
            .expect("add");

        store
            .merge("services", &id, fields(json!({ "city": "Córdoba" })))
            .await
            .expect("merge");

        let document = store.get("services", &id).await.expect("get").expect("present");
        assert_eq!(document.fields.get("name"), Some(&json!("Ana")));
        assert_eq!(document.fields.get("city"), Some(&json!("Córdoba")));
    }

    #[tokio::test]
    async fn merge_on_missing_document_fails() {
        let store = InMemoryDocumentStore::new();
        let error = store
            .merge("services", "nope", Fields::new())
            .await
            .expect_err("missing document");
        assert!(matches!(error, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn query_applies_equality_and_array_membership_in_insertion_order() {
        let store = InMemoryDocumentStore::new();
        for (name, status, categories) in [
            ("a", "active", json!(["Pintura"])),
            ("b", "inactive", json!(["Pintura"])),
            ("c", "active", json!(["Gasista", "Pintura"])),
            ("d", "active", json!(["Gasista"])),
        ] {
            store
                .add(
                    "services",
                    fields(json!({ "name": name, "status": status, "categories": categories })),
                )
                .await
                .expect("add");
        }

        let documents = store
            .query(
                "services",
                &[
                    FieldFilter::equals("status", "active"),
                    FieldFilter::array_contains("categories", "Pintura"),
                ],
            )
            .await
            .expect("query");

        let names: Vec<&str> = documents
            .iter()
            .filter_map(|document| document.fields.get("name").and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(store.len("services"), 4);
        assert!(store.is_empty("users"));
    }
}
