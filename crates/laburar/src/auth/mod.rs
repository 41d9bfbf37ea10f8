//! Identity and session handling for publishers.
//!
//! Browsing the directory needs no session; publishing, editing, and removing listings do. The
//! [`SessionManager`] owns one session and its subscribers, and talks to an
//! [`IdentityProvider`] for the actual credential checks. The HTTP layer keeps one session per
//! caller in a [`SessionRegistry`].

pub mod domain;
pub mod provider;
pub mod registry;
pub mod session;

pub use domain::{FederatedIdentity, PasswordCredentials, SignUpRequest, User, UserId};
pub use provider::{IdentityError, IdentityProvider, InMemoryIdentityProvider};
pub use registry::{SessionRegistry, SessionToken};
pub use session::{AuthError, AuthState, SessionManager, SessionSnapshot, Subscription};
