use std::sync::Arc;

use super::domain::{Listing, ListingId};
use super::filter::ListingFilter;
use super::form::{EditForm, FormSchema, PublishForm, ValidationErrors};
use super::phone::{ContactLinks, PhoneError, PhoneNumber};
use super::repository::{ListingRepository, RepositoryError};
use super::store::DocumentStore;
use crate::auth::{AuthError, IdentityProvider, SessionManager};

/// Service composing the session, the form boundary, and the listing repository.
///
/// Every mutating call checks the session and the form before the repository sees anything.
pub struct DirectoryService<S, P> {
    session: SessionManager<P>,
    repository: ListingRepository<S>,
}

impl<S, P> DirectoryService<S, P>
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    pub fn new(store: Arc<S>, session: SessionManager<P>) -> Self {
        Self {
            session,
            repository: ListingRepository::new(store),
        }
    }

    /// The same directory acting on behalf of another session.
    pub fn with_session(&self, session: SessionManager<P>) -> Self {
        Self {
            session,
            repository: self.repository.clone(),
        }
    }

    pub fn session(&self) -> &SessionManager<P> {
        &self.session
    }

    pub fn repository(&self) -> &ListingRepository<S> {
        &self.repository
    }

    pub async fn browse(&self, filter: &ListingFilter) -> Result<Vec<Listing>, DirectoryError> {
        Ok(self.repository.list(filter).await?)
    }

    pub async fn listing(&self, id: &ListingId) -> Result<Option<Listing>, DirectoryError> {
        Ok(self.repository.get_by_id(id).await?)
    }

    pub async fn publish(&self, form: &PublishForm) -> Result<Listing, DirectoryError> {
        let owner = self.session.require_user()?;
        let draft = form.validate()?;
        Ok(self.repository.create(draft, &owner.id).await?)
    }

    pub async fn edit(&self, id: &ListingId, form: &EditForm) -> Result<Listing, DirectoryError> {
        let owner = self.session.require_user()?;
        let patch = form.validate()?;
        Ok(self.repository.update(id, patch, &owner.id).await?)
    }

    pub async fn remove(&self, id: &ListingId) -> Result<(), DirectoryError> {
        let owner = self.session.require_user()?;
        Ok(self.repository.soft_delete(id, &owner.id).await?)
    }

    pub async fn my_listings(&self) -> Result<Vec<Listing>, DirectoryError> {
        let owner = self.session.require_user()?;
        Ok(self.repository.list_by_owner(&owner.id).await?)
    }

    /// WhatsApp and telephone links for an active listing.
    pub async fn contact(&self, id: &ListingId) -> Result<Option<ContactLinks>, DirectoryError> {
        let Some(listing) = self.repository.get_by_id(id).await? else {
            return Ok(None);
        };
        let phone = PhoneNumber::parse(&listing.phone)?;
        Ok(Some(ContactLinks::for_phone(
            &phone,
            listing.contact_message.as_deref(),
        )))
    }
}

/// Error raised by the directory service.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid form: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("listing phone cannot be contacted: {0}")]
    Phone(#[from] PhoneError),
}
