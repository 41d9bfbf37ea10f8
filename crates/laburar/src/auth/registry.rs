use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::provider::IdentityProvider;
use super::session::SessionManager;

/// Opaque bearer token naming one caller's session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for SessionToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One [`SessionManager`] per caller, keyed by token, all sharing a single identity provider.
pub struct SessionRegistry<P> {
    provider: Arc<P>,
    sessions: RwLock<HashMap<SessionToken, SessionManager<P>>>,
}

impl<P> SessionRegistry<P>
where
    P: IdentityProvider + 'static,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Register a fresh, signed-out session and hand back its token.
    pub fn open(&self) -> (SessionToken, SessionManager<P>) {
        let token = SessionToken::generate();
        let session = SessionManager::new(Arc::clone(&self.provider));
        self.write().insert(token.clone(), session.clone());
        (token, session)
    }

    pub fn get(&self, token: &str) -> Option<SessionManager<P>> {
        self.read().get(token).cloned()
    }

    /// A signed-out session that is never registered; callers without a token get one.
    pub fn anonymous(&self) -> SessionManager<P> {
        SessionManager::new(Arc::clone(&self.provider))
    }

    /// Forget a session and drop its subscribers. Unknown tokens are ignored.
    pub fn revoke(&self, token: &str) -> bool {
        match self.write().remove(token) {
            Some(session) => {
                session.close();
                debug!("session revoked");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every session; used when the application stops.
    pub fn close(&self) {
        for (_, session) in self.write().drain() {
            session.close();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionToken, SessionManager<P>>> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionToken, SessionManager<P>>> {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
