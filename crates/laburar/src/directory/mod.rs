//! The listing directory: phone validation, search filters, persistence, and the HTTP surface.
//!
//! Anyone may browse active listings. Publishing, editing, and removing go through
//! [`DirectoryService`], which checks the session and validates the form before the
//! [`ListingRepository`] touches the document store.

pub mod domain;
pub mod filter;
pub mod form;
pub mod phone;
pub mod repository;
pub mod router;
pub mod seed;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    Listing, ListingDraft, ListingId, ListingPatch, ListingStatus, DEFAULT_CONTACT_MESSAGE,
    SERVICE_CATEGORIES,
};
pub use filter::ListingFilter;
pub use form::{
    EditForm, FieldError, FormSchema, PublishForm, SignInForm, SignUpForm, ValidationErrors,
};
pub use phone::{ContactLinks, PhoneError, PhoneNumber};
pub use repository::{ListingRepository, RepositoryError};
pub use router::{api_router, directory_router, DirectoryApi};
pub use seed::{load_into, SampleListing, SampleListings, SeedError};
pub use service::{DirectoryError, DirectoryService};
pub use store::{DocumentStore, FieldFilter, InMemoryDocumentStore, StoreError};
