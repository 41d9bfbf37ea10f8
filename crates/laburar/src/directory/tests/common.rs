use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::auth::{FederatedIdentity, InMemoryIdentityProvider, SessionManager, User, UserId};
use crate::directory::domain::ListingDraft;
use crate::directory::form::{FormSchema, PublishForm};
use crate::directory::repository::ListingRepository;
use crate::directory::router::DirectoryApi;
use crate::directory::service::DirectoryService;
use crate::directory::store::{
    Document, DocumentStore, FieldFilter, Fields, InMemoryDocumentStore, StoreError,
};

pub(super) const DESCRIPTION: &str = "Instalaciones de gas y agua con garantía escrita.!";

pub(super) type MemoryService = DirectoryService<InMemoryDocumentStore, InMemoryIdentityProvider>;
pub(super) type MemoryApi = DirectoryApi<InMemoryDocumentStore, InMemoryIdentityProvider>;

pub(super) fn publish_form() -> PublishForm {
    PublishForm {
        name: "Juan Pérez".to_string(),
        company: Some("Plomería JP".to_string()),
        city: "Buenos Aires".to_string(),
        neighborhood: Some("Palermo".to_string()),
        phone: "+5491134567890".to_string(),
        email: Some("juan@plomeriajp.com".to_string()),
        categories: vec!["Plomería".to_string()],
        description: DESCRIPTION.to_string(),
        contact_message: None,
        custom_category: None,
    }
}

pub(super) fn draft() -> ListingDraft {
    publish_form().validate().expect("fixture form is valid")
}

pub(super) fn owner() -> UserId {
    UserId("owner-1".to_string())
}

pub(super) fn stranger() -> UserId {
    UserId("owner-2".to_string())
}

pub(super) fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, day, 12, 0, 0)
        .single()
        .expect("valid date")
}

pub(super) fn memory_repository() -> (ListingRepository<InMemoryDocumentStore>, Arc<InMemoryDocumentStore>) {
    let store = Arc::new(InMemoryDocumentStore::new());
    (ListingRepository::new(Arc::clone(&store)), store)
}

pub(super) fn build_service() -> (Arc<MemoryService>, Arc<InMemoryDocumentStore>) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let session = SessionManager::new(Arc::new(InMemoryIdentityProvider::new()));
    let service = Arc::new(DirectoryService::new(Arc::clone(&store), session));
    (service, store)
}

pub(super) fn build_api() -> (Arc<MemoryApi>, Arc<InMemoryDocumentStore>) {
    let (service, store) = build_service();
    (Arc::new(DirectoryApi::new(service)), store)
}

pub(super) fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("header value");
    headers.insert(header::AUTHORIZATION, value);
    headers
}

/// Opens a session on the API, signs it in, and returns the caller's headers.
pub(super) async fn signed_in_headers(api: &MemoryApi) -> HeaderMap {
    let (token, session) = api.sessions().open();
    session
        .sign_in_with_federated(&google_identity())
        .await
        .expect("popup sign in succeeds");
    bearer(token.as_str())
}

pub(super) fn google_identity() -> FederatedIdentity {
    FederatedIdentity {
        provider: "google".to_string(),
        subject: "google-sub-1".to_string(),
        email: "publicador@gmail.com".to_string(),
        display_name: "Publicador Demo".to_string(),
        photo_url: None,
    }
}

pub(super) async fn sign_in(service: &MemoryService) -> User {
    service
        .session()
        .sign_in_with_federated(&google_identity())
        .await
        .expect("popup sign in succeeds")
}

pub(super) fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Store whose backend is always down.
pub(super) struct UnavailableStore;

fn offline() -> StoreError {
    StoreError::Unavailable("backend offline".to_string())
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn add(&self, _collection: &str, _fields: Fields) -> Result<String, StoreError> {
        Err(offline())
    }

    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<Document>, StoreError> {
        Err(offline())
    }

    async fn merge(&self, _collection: &str, _id: &str, _fields: Fields) -> Result<(), StoreError> {
        Err(offline())
    }

    async fn query(
        &self,
        _collection: &str,
        _filters: &[FieldFilter],
    ) -> Result<Vec<Document>, StoreError> {
        Err(offline())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
