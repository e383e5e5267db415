use std::sync::Arc;

use super::store::SessionStore;

/// Callback fired when the session is torn down irrecoverably.
///
/// The embedding front end decides what "back to login" means.
pub type SessionExpiredCallback = Arc<dyn Fn() + Send + Sync>;

/// Terminates the session: clears the store, then signals the front end
#[derive(Clone)]
pub struct LogoutHandler {
    store: SessionStore,
    on_session_expired: SessionExpiredCallback,
}

impl LogoutHandler {
    pub fn new<F>(store: SessionStore, on_session_expired: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            store,
            on_session_expired: Arc::new(on_session_expired),
        }
    }

    /// Clear the session and fire the callback.
    ///
    /// Safe to call on an already cleared session; the callback still fires.
    pub async fn logout(&self) {
        self.store.clear().await;
        tracing::info!("Session cleared, returning to login");
        (self.on_session_expired)();
    }
}
