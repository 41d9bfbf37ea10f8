use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tracing::{debug, warn};

use super::domain::{FederatedIdentity, PasswordCredentials, SignUpRequest, User};
use super::provider::{IdentityError, IdentityProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    SignedOut,
    Authenticating,
    SignedIn,
}

/// What listeners receive: the state and, when signed in, the session's user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: AuthState,
    pub user: Option<User>,
}

impl SessionSnapshot {
    fn signed_out() -> Self {
        Self {
            state: AuthState::SignedOut,
            user: None,
        }
    }

    fn authenticating() -> Self {
        Self {
            state: AuthState::Authenticating,
            user: None,
        }
    }

    fn signed_in(user: User) -> Self {
        Self {
            state: AuthState::SignedIn,
            user: Some(user),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("sign in required")]
    NotSignedIn,
    #[error("a sign-in attempt is already in progress")]
    SignInInProgress,
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

type Listener = Box<dyn Fn(&SessionSnapshot) + Send + Sync>;

/// A listener plus the newest snapshot version it has been handed.
struct Delivery {
    listener: Listener,
    seen: AtomicU64,
}

impl Delivery {
    fn new(listener: Listener) -> Self {
        Self {
            listener,
            seen: AtomicU64::new(0),
        }
    }

    /// Versions at or below the last one delivered are dropped.
    fn deliver(&self, version: u64, snapshot: &SessionSnapshot) {
        if self.seen.fetch_max(version, Ordering::AcqRel) < version {
            (self.listener)(snapshot);
        }
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Arc<Delivery>)>,
}

/// The snapshot and a counter bumped on every transition.
struct Current {
    version: u64,
    snapshot: SessionSnapshot,
}

impl Current {
    fn advance(&mut self, next: SessionSnapshot) -> (u64, SessionSnapshot) {
        self.version += 1;
        self.snapshot = next.clone();
        (self.version, next)
    }
}

struct Shared {
    current: Mutex<Current>,
    registry: Mutex<Registry>,
}

impl Shared {
    fn current(&self) -> MutexGuard<'_, Current> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: u64) -> bool {
        let mut registry = self.registry();
        let before = registry.listeners.len();
        registry.listeners.retain(|(existing, _)| *existing != id);
        registry.listeners.len() != before
    }
}

/// Owns the current session and its subscribers.
///
/// Delivery is synchronous and follows registration order. A new subscriber is invoked once
/// with the present snapshot before `subscribe` returns, and never sees an older snapshot
/// after a newer one.
pub struct SessionManager<P> {
    provider: Arc<P>,
    shared: Arc<Shared>,
}

impl<P> Clone for SessionManager<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P> SessionManager<P>
where
    P: IdentityProvider + 'static,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            shared: Arc::new(Shared {
                current: Mutex::new(Current {
                    version: 1,
                    snapshot: SessionSnapshot::signed_out(),
                }),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.current().snapshot.clone()
    }

    pub fn state(&self) -> AuthState {
        self.shared.current().snapshot.state
    }

    pub fn current_user(&self) -> Option<User> {
        self.shared.current().snapshot.user.clone()
    }

    /// The signed-in user, or `NotSignedIn`.
    pub fn require_user(&self) -> Result<User, AuthError> {
        self.current_user().ok_or(AuthError::NotSignedIn)
    }

    pub async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<User, AuthError> {
        self.begin_authentication()?;
        let outcome = self.provider.sign_in_with_password(credentials).await;
        self.finish_authentication(outcome, "password")
    }

    pub async fn sign_up_with_password(&self, request: &SignUpRequest) -> Result<User, AuthError> {
        self.begin_authentication()?;
        let outcome = self.provider.sign_up_with_password(request).await;
        self.finish_authentication(outcome, "sign_up")
    }

    pub async fn sign_in_with_federated(
        &self,
        identity: &FederatedIdentity,
    ) -> Result<User, AuthError> {
        self.begin_authentication()?;
        let outcome = self.provider.sign_in_with_federated(identity).await;
        self.finish_authentication(outcome, "federated")
    }

    /// Tear the session down. The local session ends even when the provider call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let (user, version, snapshot) = {
            let mut current = self.shared.current();
            match current.snapshot.state {
                AuthState::SignedOut => return Ok(()),
                AuthState::Authenticating => return Err(AuthError::SignInInProgress),
                AuthState::SignedIn => {}
            }
            let user = current.snapshot.user.take();
            let (version, snapshot) = current.advance(SessionSnapshot::authenticating());
            (user, version, snapshot)
        };
        self.notify(version, &snapshot);

        let outcome = match &user {
            Some(user) => self.provider.sign_out(&user.id).await,
            None => Ok(()),
        };

        self.transition(SessionSnapshot::signed_out());
        if let Some(user) = &user {
            debug!(user_id = %user.id, "session signed out");
        }
        outcome.map_err(|err| {
            warn!(error = %err, "identity provider sign-out failed; local session cleared");
            AuthError::from(err)
        })
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionSnapshot) + Send + Sync + 'static,
    {
        let delivery = Arc::new(Delivery::new(Box::new(listener)));
        let id = {
            let mut registry = self.shared.registry();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, Arc::clone(&delivery)));
            id
        };

        // A transition racing this call may already have delivered something newer.
        let (version, present) = {
            let current = self.shared.current();
            (current.version, current.snapshot.clone())
        };
        delivery.deliver(version, &present);

        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
            active: AtomicBool::new(true),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.registry().listeners.len()
    }

    /// Drop every subscriber; used when the application stops.
    pub fn close(&self) {
        self.shared.registry().listeners.clear();
    }

    fn begin_authentication(&self) -> Result<(), AuthError> {
        let (version, snapshot) = {
            let mut current = self.shared.current();
            if current.snapshot.state == AuthState::Authenticating {
                return Err(AuthError::SignInInProgress);
            }
            current.advance(SessionSnapshot::authenticating())
        };
        self.notify(version, &snapshot);
        Ok(())
    }

    fn finish_authentication(
        &self,
        outcome: Result<User, IdentityError>,
        method: &'static str,
    ) -> Result<User, AuthError> {
        match outcome {
            Ok(user) => {
                debug!(user_id = %user.id, method, "session signed in");
                self.transition(SessionSnapshot::signed_in(user.clone()));
                Ok(user)
            }
            Err(err) => {
                warn!(error = %err, method, "sign-in attempt failed");
                self.transition(SessionSnapshot::signed_out());
                Err(AuthError::Identity(err))
            }
        }
    }

    fn transition(&self, next: SessionSnapshot) {
        let (version, snapshot) = self.shared.current().advance(next);
        self.notify(version, &snapshot);
    }

    fn notify(&self, version: u64, snapshot: &SessionSnapshot) {
        let deliveries: Vec<Arc<Delivery>> = self
            .shared
            .registry()
            .listeners
            .iter()
            .map(|(_, delivery)| Arc::clone(delivery))
            .collect();

        for delivery in deliveries {
            delivery.deliver(version, snapshot);
        }
    }
}

/// Handle returned by [`SessionManager::subscribe`].
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
    active: AtomicBool,
}

impl Subscription {
    /// Stop receiving updates. Safe to call any number of times.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        match self.shared.upgrade() {
            Some(shared) => shared.remove(self.id),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::InMemoryIdentityProvider;

    fn manager() -> SessionManager<InMemoryIdentityProvider> {
        SessionManager::new(Arc::new(InMemoryIdentityProvider::new()))
    }

    fn sign_up_request() -> SignUpRequest {
        SignUpRequest {
            display_name: "Usuario Demo".to_string(),
            credentials: PasswordCredentials {
                email: "usuario@gmail.com".to_string(),
                password: "secreto1".to_string(),
            },
        }
    }

    fn recorder(
        manager: &SessionManager<InMemoryIdentityProvider>,
    ) -> (Arc<Mutex<Vec<AuthState>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = manager.subscribe(move |snapshot| {
            sink.lock().expect("recorder lock").push(snapshot.state);
        });
        (seen, subscription)
    }

    #[tokio::test]
    async fn subscribers_get_the_present_state_immediately() {
        let manager = manager();
        let (seen, _subscription) = recorder(&manager);
        assert_eq!(*seen.lock().expect("lock"), vec![AuthState::SignedOut]);

        manager
            .sign_up_with_password(&sign_up_request())
            .await
            .expect("sign up");

        let late = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&late);
        let _late_subscription = manager.subscribe(move |snapshot| {
            *sink.lock().expect("lock") = snapshot.user.clone();
        });
        let replayed = late.lock().expect("lock").clone();
        assert_eq!(
            replayed.map(|user| user.email),
            Some("usuario@gmail.com".to_string())
        );
    }

    #[tokio::test]
    async fn sign_in_and_out_walk_the_state_machine() {
        let manager = manager();
        let (seen, _subscription) = recorder(&manager);

        manager
            .sign_up_with_password(&sign_up_request())
            .await
            .expect("sign up");
        assert_eq!(manager.state(), AuthState::SignedIn);

        manager.sign_out().await.expect("sign out");
        assert_eq!(manager.state(), AuthState::SignedOut);
        assert!(manager.current_user().is_none());

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![
                AuthState::SignedOut,
                AuthState::Authenticating,
                AuthState::SignedIn,
                AuthState::Authenticating,
                AuthState::SignedOut,
            ]
        );
    }

    #[tokio::test]
    async fn failed_sign_in_returns_to_signed_out() {
        let manager = manager();
        let (seen, _subscription) = recorder(&manager);

        let result = manager
            .sign_in_with_password(&PasswordCredentials {
                email: "nadie@gmail.com".to_string(),
                password: "secreto1".to_string(),
            })
            .await;

        assert_eq!(
            result,
            Err(AuthError::Identity(IdentityError::InvalidCredentials))
        );
        assert_eq!(manager.state(), AuthState::SignedOut);
        assert!(manager.current_user().is_none());
        assert_eq!(
            *seen.lock().expect("lock"),
            vec![
                AuthState::SignedOut,
                AuthState::Authenticating,
                AuthState::SignedOut
            ]
        );
    }

    #[tokio::test]
    async fn require_user_fails_without_session() {
        let manager = manager();
        assert_eq!(manager.require_user(), Err(AuthError::NotSignedIn));
        assert!(manager.sign_out().await.is_ok());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let manager = manager();
        let (_seen, subscription) = recorder(&manager);
        assert_eq!(manager.listener_count(), 1);

        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        assert!(!subscription.is_active());
        assert_eq!(manager.listener_count(), 0);
    }

    #[test]
    fn unsubscribe_after_manager_is_gone_is_harmless() {
        let manager = manager();
        let (_seen, subscription) = recorder(&manager);
        drop(manager);
        assert!(!subscription.unsubscribe());
    }

    #[tokio::test]
    async fn listeners_fire_in_registration_order() {
        let manager = manager();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let _a = manager.subscribe(move |snapshot| {
            if snapshot.state == AuthState::SignedIn {
                first.lock().expect("lock").push("first");
            }
        });
        let second = Arc::clone(&order);
        let _b = manager.subscribe(move |snapshot| {
            if snapshot.state == AuthState::SignedIn {
                second.lock().expect("lock").push("second");
            }
        });

        manager
            .sign_up_with_password(&sign_up_request())
            .await
            .expect("sign up");
        assert_eq!(*order.lock().expect("lock"), vec!["first", "second"]);
    }

    #[test]
    fn stale_snapshots_are_not_delivered_after_newer_ones() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let delivery = Delivery::new(Box::new(move |snapshot: &SessionSnapshot| {
            sink.lock().expect("lock").push(snapshot.state);
        }));

        delivery.deliver(3, &SessionSnapshot::authenticating());
        delivery.deliver(2, &SessionSnapshot::signed_out());
        delivery.deliver(3, &SessionSnapshot::authenticating());
        delivery.deliver(4, &SessionSnapshot::signed_out());

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![AuthState::Authenticating, AuthState::SignedOut]
        );
    }

    #[tokio::test]
    async fn subscribing_from_a_listener_replays_the_present_state_once() {
        let manager = manager();
        let nested = Arc::new(Mutex::new(Vec::new()));
        let holder: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let inner_manager = manager.clone();
        let inner_sink = Arc::clone(&nested);
        let inner_holder = Arc::clone(&holder);
        let _outer = manager.subscribe(move |snapshot| {
            if snapshot.state != AuthState::SignedIn {
                return;
            }
            let sink = Arc::clone(&inner_sink);
            let subscription = inner_manager.subscribe(move |snapshot| {
                sink.lock().expect("lock").push(snapshot.state);
            });
            inner_holder.lock().expect("lock").push(subscription);
        });

        manager
            .sign_up_with_password(&sign_up_request())
            .await
            .expect("sign up");

        assert_eq!(*nested.lock().expect("lock"), vec![AuthState::SignedIn]);
    }

    #[test]
    fn close_drops_every_listener() {
        let manager = manager();
        let (_seen, subscription) = recorder(&manager);
        let (_other, _other_subscription) = recorder(&manager);

        manager.close();
        assert_eq!(manager.listener_count(), 0);
        assert!(!subscription.unsubscribe());
    }
}
