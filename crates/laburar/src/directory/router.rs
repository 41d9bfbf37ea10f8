use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::domain::{ListingId, SERVICE_CATEGORIES};
use super::filter::ListingFilter;
use super::form::{EditForm, FormSchema, PublishForm, SignInForm, SignUpForm};
use super::repository::RepositoryError;
use super::service::{DirectoryError, DirectoryService};
use super::store::DocumentStore;
use crate::auth::{
    AuthError, FederatedIdentity, IdentityError, IdentityProvider, SessionManager,
    SessionRegistry, SessionToken, User,
};

const WRITE_REJECTED: &str = "you cannot modify this listing";
const LISTING_NOT_FOUND: &str = "listing not found";
const BEARER_PREFIX: &str = "Bearer ";

/// Router state: the shared directory plus one session per caller token.
pub struct DirectoryApi<S, P> {
    service: Arc<DirectoryService<S, P>>,
    sessions: SessionRegistry<P>,
}

impl<S, P> DirectoryApi<S, P>
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    pub fn new(service: Arc<DirectoryService<S, P>>) -> Self {
        let sessions = SessionRegistry::new(Arc::clone(service.session().provider()));
        Self { service, sessions }
    }

    pub fn service(&self) -> &Arc<DirectoryService<S, P>> {
        &self.service
    }

    pub fn sessions(&self) -> &SessionRegistry<P> {
        &self.sessions
    }

    /// The session named by the request's bearer token. Missing or unknown tokens get a
    /// signed-out session.
    pub fn session_for(&self, headers: &HeaderMap) -> SessionManager<P> {
        bearer_token(headers)
            .and_then(|token| self.sessions.get(token))
            .unwrap_or_else(|| self.sessions.anonymous())
    }

    fn acting_for(&self, headers: &HeaderMap) -> DirectoryService<S, P> {
        self.service.with_session(self.session_for(headers))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

type Shared<S, P> = State<Arc<DirectoryApi<S, P>>>;

/// Router exposing the directory, the publisher's listings, and the session endpoints.
pub fn directory_router<S, P>(service: Arc<DirectoryService<S, P>>) -> Router
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    api_router(Arc::new(DirectoryApi::new(service)))
}

/// Same routes over an existing [`DirectoryApi`], so callers can keep a handle on its sessions.
pub fn api_router<S, P>(api: Arc<DirectoryApi<S, P>>) -> Router
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    Router::new()
        .route("/api/v1/categories", get(categories_handler))
        .route(
            "/api/v1/listings",
            get(list_handler::<S, P>).post(publish_handler::<S, P>),
        )
        .route(
            "/api/v1/listings/:listing_id",
            get(listing_handler::<S, P>)
                .patch(edit_handler::<S, P>)
                .delete(remove_handler::<S, P>),
        )
        .route(
            "/api/v1/listings/:listing_id/contact",
            get(contact_handler::<S, P>),
        )
        .route("/api/v1/me/listings", get(my_listings_handler::<S, P>))
        .route(
            "/api/v1/session",
            get(session_handler::<S, P>)
                .post(sign_in_handler::<S, P>)
                .delete(sign_out_handler::<S, P>),
        )
        .route(
            "/api/v1/session/federated",
            post(federated_sign_in_handler::<S, P>),
        )
        .route("/api/v1/accounts", post(sign_up_handler::<S, P>))
        .with_state(api)
}

pub(crate) async fn categories_handler() -> Response {
    (StatusCode::OK, Json(json!({ "categories": SERVICE_CATEGORIES }))).into_response()
}

pub(crate) async fn list_handler<S, P>(
    State(api): Shared<S, P>,
    Query(filter): Query<ListingFilter>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    match api.service.browse(&filter).await {
        Ok(listings) => (StatusCode::OK, Json(listings)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn listing_handler<S, P>(
    State(api): Shared<S, P>,
    Path(listing_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    match api.service.listing(&ListingId(listing_id)).await {
        Ok(Some(listing)) => (StatusCode::OK, Json(listing)).into_response(),
        Ok(None) => not_found(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn contact_handler<S, P>(
    State(api): Shared<S, P>,
    Path(listing_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    match api.service.contact(&ListingId(listing_id)).await {
        Ok(Some(links)) => (StatusCode::OK, Json(links)).into_response(),
        Ok(None) => not_found(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn publish_handler<S, P>(
    State(api): Shared<S, P>,
    headers: HeaderMap,
    Json(form): Json<PublishForm>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    match api.acting_for(&headers).publish(&form).await {
        Ok(listing) => (StatusCode::CREATED, Json(listing)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn edit_handler<S, P>(
    State(api): Shared<S, P>,
    Path(listing_id): Path<String>,
    headers: HeaderMap,
    Json(form): Json<EditForm>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    match api.acting_for(&headers).edit(&ListingId(listing_id), &form).await {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_handler<S, P>(
    State(api): Shared<S, P>,
    Path(listing_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    match api.acting_for(&headers).remove(&ListingId(listing_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn my_listings_handler<S, P>(
    State(api): Shared<S, P>,
    headers: HeaderMap,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    match api.acting_for(&headers).my_listings().await {
        Ok(listings) => (StatusCode::OK, Json(listings)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn session_handler<S, P>(
    State(api): Shared<S, P>,
    headers: HeaderMap,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    (StatusCode::OK, Json(api.session_for(&headers).snapshot())).into_response()
}

pub(crate) async fn sign_in_handler<S, P>(
    State(api): Shared<S, P>,
    Json(form): Json<SignInForm>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    let credentials = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return error_response(errors.into()),
    };
    let (token, session) = api.sessions.open();
    let outcome = session.sign_in_with_password(&credentials).await;
    session_opened(&api, token, outcome, StatusCode::OK)
}

pub(crate) async fn federated_sign_in_handler<S, P>(
    State(api): Shared<S, P>,
    Json(identity): Json<FederatedIdentity>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    let (token, session) = api.sessions.open();
    let outcome = session.sign_in_with_federated(&identity).await;
    session_opened(&api, token, outcome, StatusCode::OK)
}

pub(crate) async fn sign_up_handler<S, P>(
    State(api): Shared<S, P>,
    Json(form): Json<SignUpForm>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    let request = match form.validate() {
        Ok(request) => request,
        Err(errors) => return error_response(errors.into()),
    };
    let (token, session) = api.sessions.open();
    let outcome = session.sign_up_with_password(&request).await;
    session_opened(&api, token, outcome, StatusCode::CREATED)
}

/// Ends the caller's session and forgets its token. Calls without a live token succeed.
pub(crate) async fn sign_out_handler<S, P>(
    State(api): Shared<S, P>,
    headers: HeaderMap,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    let Some(token) = bearer_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let Some(session) = api.sessions.get(token) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let outcome = session.sign_out().await;
    api.sessions.revoke(token);
    match outcome {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error.into()),
    }
}

fn session_opened<S, P>(
    api: &DirectoryApi<S, P>,
    token: SessionToken,
    outcome: Result<User, AuthError>,
    status: StatusCode,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    match outcome {
        Ok(user) => (status, Json(json!({ "token": token, "user": user }))).into_response(),
        Err(error) => {
            api.sessions.revoke(token.as_str());
            error_response(error.into())
        }
    }
}

fn not_found() -> Response {
    let payload = json!({ "error": LISTING_NOT_FOUND });
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}

fn error_response(error: DirectoryError) -> Response {
    let status = match &error {
        DirectoryError::Validation(errors) => {
            let payload = json!({
                "error": "invalid form",
                "fields": errors.errors,
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
        // Missing and foreign listings look the same to the caller.
        DirectoryError::Repository(RepositoryError::NotAuthorized | RepositoryError::NotFound) => {
            let payload = json!({ "error": WRITE_REJECTED });
            return (StatusCode::FORBIDDEN, Json(payload)).into_response();
        }
        DirectoryError::Repository(_) => StatusCode::SERVICE_UNAVAILABLE,
        DirectoryError::Auth(AuthError::NotSignedIn) => StatusCode::UNAUTHORIZED,
        DirectoryError::Auth(AuthError::SignInInProgress) => StatusCode::CONFLICT,
        DirectoryError::Auth(AuthError::Identity(IdentityError::InvalidCredentials)) => {
            StatusCode::UNAUTHORIZED
        }
        DirectoryError::Auth(AuthError::Identity(IdentityError::EmailInUse)) => {
            StatusCode::CONFLICT
        }
        DirectoryError::Auth(AuthError::Identity(IdentityError::Unavailable(_))) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DirectoryError::Phone(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}
