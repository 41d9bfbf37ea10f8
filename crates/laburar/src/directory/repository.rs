use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::domain::{Listing, ListingDraft, ListingId, ListingPatch, ListingStatus};
use super::filter::ListingFilter;
use super::store::{Document, DocumentStore, FieldFilter, Fields, StoreError, LISTINGS_COLLECTION};
use crate::auth::UserId;

/// Errors surfaced to callers. Backend causes are logged, never returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("not authorized to modify this listing")]
    NotAuthorized,
    #[error("listing not found")]
    NotFound,
    #[error("could not load listings")]
    Load,
    #[error("could not save listing")]
    Save,
    #[error("could not delete listing")]
    Delete,
}

/// Owner field names, canonical first.
const OWNER_FIELDS: [&str; 3] = ["ownerId", "userId", "authorUid"];

/// Stored shape of a listing. `ownerId` and `contactMessage` are canonical; older documents
/// used `userId`/`authorUid` and `whatsappMessage`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingDocument {
    #[serde(alias = "userId", alias = "authorUid")]
    owner_id: UserId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    company: Option<String>,
    city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    neighborhood: Option<String>,
    phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    categories: Vec<String>,
    description: String,
    status: ListingStatus,
    created_at: DateTime<Utc>,
    #[serde(
        default,
        alias = "whatsappMessage",
        skip_serializing_if = "Option::is_none"
    )]
    contact_message: Option<String>,
}

impl ListingDocument {
    fn from_draft(draft: ListingDraft, owner: &UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner.clone(),
            name: draft.name,
            company: draft.company,
            city: draft.city,
            neighborhood: draft.neighborhood,
            phone: draft.phone,
            email: draft.email,
            categories: draft.categories,
            description: draft.description,
            status: ListingStatus::Active,
            created_at,
            contact_message: draft.contact_message,
        }
    }

    fn into_listing(self, id: String) -> Listing {
        Listing {
            id: ListingId(id),
            owner_id: self.owner_id,
            name: self.name,
            company: self.company,
            city: self.city,
            neighborhood: self.neighborhood,
            phone: self.phone,
            email: self.email,
            categories: self.categories,
            description: self.description,
            status: self.status,
            created_at: self.created_at,
            contact_message: self.contact_message,
        }
    }
}

fn decode(document: Document) -> Result<Listing, serde_json::Error> {
    let Document { id, fields } = document;
    serde_json::from_value::<ListingDocument>(Value::Object(fields))
        .map(|stored| stored.into_listing(id))
}

fn encode(document: &ListingDocument) -> Result<Fields, serde_json::Error> {
    match serde_json::to_value(document)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(serde::ser::Error::custom("listing did not encode as an object")),
    }
}

/// Only the text fields a patch names; cleared optional fields become `null`.
fn patch_fields(patch: &ListingPatch) -> Fields {
    let mut fields = Fields::new();
    let mut required = |key: &str, value: &Option<String>| {
        if let Some(value) = value {
            fields.insert(key.to_string(), Value::String(value.clone()));
        }
    };
    required("name", &patch.name);
    required("city", &patch.city);
    required("phone", &patch.phone);
    required("description", &patch.description);

    for (key, value) in [
        ("company", &patch.company),
        ("neighborhood", &patch.neighborhood),
        ("email", &patch.email),
        ("contactMessage", &patch.contact_message),
    ] {
        if let Some(value) = value {
            let stored = if value.trim().is_empty() {
                Value::Null
            } else {
                Value::String(value.clone())
            };
            fields.insert(key.to_string(), stored);
        }
    }
    fields
}

fn categories_value(categories: &[String]) -> Value {
    Value::Array(categories.iter().cloned().map(Value::String).collect())
}

fn newest_first(listings: &mut [Listing]) {
    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Listing reads and writes over the `services` collection.
pub struct ListingRepository<S> {
    store: Arc<S>,
}

impl<S> Clone for ListingRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> ListingRepository<S>
where
    S: DocumentStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active listings matching `filter`, newest first.
    pub async fn list(&self, filter: &ListingFilter) -> Result<Vec<Listing>, RepositoryError> {
        let mut pushed = vec![FieldFilter::equals("status", ListingStatus::Active.label())];
        if let Some(category) = filter.category_criterion() {
            pushed.push(FieldFilter::array_contains("categories", category));
        }

        let documents = self
            .store
            .query(LISTINGS_COLLECTION, &pushed)
            .await
            .map_err(|err| backend_failure("list", err, RepositoryError::Load))?;

        let mut listings = self.decode_all(documents);
        newest_first(&mut listings);
        Ok(filter.apply(listings))
    }

    /// Every listing the owner published, whatever its status, newest first. Documents
    /// written under a legacy owner field are included.
    pub async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<Listing>, RepositoryError> {
        let mut documents: Vec<Document> = Vec::new();
        for field in OWNER_FIELDS {
            let matched = self
                .store
                .query(
                    LISTINGS_COLLECTION,
                    &[FieldFilter::equals(field, owner.0.as_str())],
                )
                .await
                .map_err(|err| backend_failure("list_by_owner", err, RepositoryError::Load))?;

            for document in matched {
                if !documents.iter().any(|seen| seen.id == document.id) {
                    documents.push(document);
                }
            }
        }

        let mut listings = self.decode_all(documents);
        newest_first(&mut listings);
        Ok(listings)
    }

    /// An active listing, or `None` for missing and inactive ids alike.
    pub async fn get_by_id(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        let listing = self.fetch(id, RepositoryError::Load).await?;
        Ok(listing.filter(Listing::is_active))
    }

    pub async fn create(
        &self,
        draft: ListingDraft,
        owner: &UserId,
    ) -> Result<Listing, RepositoryError> {
        self.create_at(draft, owner, Utc::now()).await
    }

    /// Persist a draft with an explicit creation time (imports and sample data).
    pub async fn create_at(
        &self,
        draft: ListingDraft,
        owner: &UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Listing, RepositoryError> {
        let document = ListingDocument::from_draft(draft, owner, created_at);
        let fields = encode(&document).map_err(|err| {
            error!(error = %err, "failed to encode listing document");
            RepositoryError::Save
        })?;

        let id = self
            .store
            .add(LISTINGS_COLLECTION, fields)
            .await
            .map_err(|err| backend_failure("create", err, RepositoryError::Save))?;

        let listing = document.into_listing(id);
        info!(listing_id = %listing.id, owner_id = %owner, "listing created");
        Ok(listing)
    }

    /// Merge a validated patch into a listing the caller owns.
    pub async fn update(
        &self,
        id: &ListingId,
        patch: ListingPatch,
        owner: &UserId,
    ) -> Result<Listing, RepositoryError> {
        let mut listing = self.owned(id, owner, RepositoryError::Save).await?;
        if patch.is_empty() {
            return Ok(listing);
        }

        let mut fields = patch_fields(&patch);
        let touches_categories = patch.categories.is_some() || patch.custom_category.is_some();
        listing.apply(patch);
        // Categories are written whole, after the custom entry is folded in.
        if touches_categories {
            fields.insert("categories".to_string(), categories_value(&listing.categories));
        }

        self.store
            .merge(LISTINGS_COLLECTION, &id.0, fields)
            .await
            .map_err(|err| backend_failure("update", err, RepositoryError::Save))?;

        info!(listing_id = %id, owner_id = %owner, "listing updated");
        Ok(listing)
    }

    /// Mark a listing the caller owns as inactive. The document is kept.
    pub async fn soft_delete(&self, id: &ListingId, owner: &UserId) -> Result<(), RepositoryError> {
        self.owned(id, owner, RepositoryError::Delete).await?;

        let mut fields = Fields::new();
        fields.insert(
            "status".to_string(),
            Value::String(ListingStatus::Inactive.label().to_string()),
        );
        self.store
            .merge(LISTINGS_COLLECTION, &id.0, fields)
            .await
            .map_err(|err| backend_failure("soft_delete", err, RepositoryError::Delete))?;

        info!(listing_id = %id, owner_id = %owner, "listing deactivated");
        Ok(())
    }

    async fn owned(
        &self,
        id: &ListingId,
        owner: &UserId,
        failure: RepositoryError,
    ) -> Result<Listing, RepositoryError> {
        let listing = self
            .fetch(id, failure)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if !listing.is_owned_by(owner) {
            warn!(listing_id = %id, actor_id = %owner, "rejected write to listing owned by another user");
            return Err(RepositoryError::NotAuthorized);
        }
        Ok(listing)
    }

    async fn fetch(
        &self,
        id: &ListingId,
        failure: RepositoryError,
    ) -> Result<Option<Listing>, RepositoryError> {
        let document = self
            .store
            .get(LISTINGS_COLLECTION, &id.0)
            .await
            .map_err(|err| backend_failure("get", err, failure.clone()))?;

        match document {
            Some(document) => decode(document).map(Some).map_err(|err| {
                error!(listing_id = %id, error = %err, "stored listing is malformed");
                failure
            }),
            None => Ok(None),
        }
    }

    fn decode_all(&self, documents: Vec<Document>) -> Vec<Listing> {
        documents
            .into_iter()
            .filter_map(|document| {
                let id = document.id.clone();
                match decode(document) {
                    Ok(listing) => Some(listing),
                    Err(err) => {
                        warn!(listing_id = %id, error = %err, "skipping malformed listing document");
                        None
                    }
                }
            })
            .collect()
    }
}

fn backend_failure(operation: &'static str, err: StoreError, surfaced: RepositoryError) -> RepositoryError {
    error!(operation, error = %err, "document store call failed");
    surfaced
}
