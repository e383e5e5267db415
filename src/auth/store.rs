use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{Identity, Session, TokenPair};

/// Single source of truth for the client session.
///
/// Cloning yields another handle to the same session. `set` and `clear` are
/// the only mutators and each replaces the whole value under one write lock,
/// so readers never observe a half-updated token pair.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a previously saved session
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    /// Snapshot of the current session
    pub async fn get(&self) -> Session {
        self.inner.read().await.clone()
    }

    /// Replace the session after login or refresh
    pub async fn set(&self, access_token: String, refresh_token: String, identity: Option<Identity>) {
        let session = Session::authenticated(
            TokenPair {
                access_token,
                refresh_token,
            },
            identity,
        );
        *self.inner.write().await = session;
    }

    /// Drop tokens and identity
    pub async fn clear(&self) {
        *self.inner.write().await = Session::default();
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.access_token().map(str::to_string)
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.inner.read().await.refresh_token().map(str::to_string)
    }
}
