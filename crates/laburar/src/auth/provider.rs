use std::collections::HashMap;
use std::sync::Mutex;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::domain::{FederatedIdentity, PasswordCredentials, SignUpRequest, User, UserId};

/// External identity service: password accounts plus third-party popup sign-in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<User, IdentityError>;

    async fn sign_up_with_password(&self, request: &SignUpRequest) -> Result<User, IdentityError>;

    async fn sign_in_with_federated(
        &self,
        identity: &FederatedIdentity,
    ) -> Result<User, IdentityError>;

    async fn sign_out(&self, user: &UserId) -> Result<(), IdentityError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account already exists for this email")]
    EmailInUse,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

struct Account {
    user: User,
    password_hash: Option<String>,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    federated: HashMap<(String, String), String>,
}

/// Process-local provider used by the bundled service and the tests.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    accounts: Mutex<Accounts>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Accounts>, IdentityError> {
        self.accounts
            .lock()
            .map_err(|_| IdentityError::Unavailable("account store poisoned".to_string()))
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

fn new_user(email: &str, name: &str, photo_url: Option<String>) -> User {
    User {
        id: UserId(format!("user-{}", Uuid::new_v4())),
        email: email.trim().to_string(),
        name: name.trim().to_string(),
        photo_url,
        created_at: Utc::now(),
    }
}

fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| IdentityError::Unavailable(format!("failed to hash password: {err}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<User, IdentityError> {
        let accounts = self.lock()?;
        let account = accounts
            .by_email
            .get(&email_key(&credentials.email))
            .ok_or(IdentityError::InvalidCredentials)?;

        match account.password_hash.as_deref() {
            Some(hash) if verify_password(&credentials.password, hash) => Ok(account.user.clone()),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    async fn sign_up_with_password(&self, request: &SignUpRequest) -> Result<User, IdentityError> {
        let key = email_key(&request.credentials.email);
        let password_hash = hash_password(&request.credentials.password)?;

        let mut accounts = self.lock()?;
        if accounts.by_email.contains_key(&key) {
            return Err(IdentityError::EmailInUse);
        }

        let user = new_user(&request.credentials.email, &request.display_name, None);
        accounts.by_email.insert(
            key,
            Account {
                user: user.clone(),
                password_hash: Some(password_hash),
            },
        );
        Ok(user)
    }

    async fn sign_in_with_federated(
        &self,
        identity: &FederatedIdentity,
    ) -> Result<User, IdentityError> {
        let mut accounts = self.lock()?;
        let link = (identity.provider.clone(), identity.subject.clone());

        if let Some(email) = accounts.federated.get(&link).cloned() {
            if let Some(account) = accounts.by_email.get(&email) {
                return Ok(account.user.clone());
            }
        }

        // A password account with the same email is linked rather than duplicated.
        let key = email_key(&identity.email);
        let user = match accounts.by_email.get_mut(&key) {
            Some(account) => {
                if account.user.photo_url.is_none() {
                    account.user.photo_url = identity.photo_url.clone();
                }
                account.user.clone()
            }
            None => {
                let user = new_user(
                    &identity.email,
                    &identity.display_name,
                    identity.photo_url.clone(),
                );
                accounts.by_email.insert(
                    key.clone(),
                    Account {
                        user: user.clone(),
                        password_hash: None,
                    },
                );
                user
            }
        };
        accounts.federated.insert(link, key);
        Ok(user)
    }

    async fn sign_out(&self, _user: &UserId) -> Result<(), IdentityError> {
        Ok(())
    }
}
