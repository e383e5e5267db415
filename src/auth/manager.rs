use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::logout::LogoutHandler;
use super::refresh::TokenRefreshClient;
use super::store::SessionStore;
use super::types::TokenPair;
use crate::error::RefreshError;

/// Handle on a spawned refresh, shared by every request that hit a 401 while it runs
type RefreshFlight = Shared<BoxFuture<'static, Result<TokenPair, RefreshError>>>;

/// Outcome of asking the manager to recover from a 401
#[derive(Debug, Clone, PartialEq)]
pub enum Renewal {
    /// Replay with this access token
    Renewed(String),
    /// No refresh token was stored; the session has been logged out
    NoCredential,
    /// The refresh call failed; the session has been logged out
    Failed(RefreshError),
}

/// Authentication manager
/// Owns session recovery and ensures only one refresh runs at a time
pub struct AuthManager {
    store: SessionStore,
    refresher: TokenRefreshClient,
    logout: LogoutHandler,
    in_flight: Arc<Mutex<Option<RefreshFlight>>>,
}

impl AuthManager {
    pub fn new(store: SessionStore, refresher: TokenRefreshClient, logout: LogoutHandler) -> Self {
        Self {
            store,
            refresher,
            logout,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn logout_handler(&self) -> &LogoutHandler {
        &self.logout
    }

    /// Recover the session after a request sent with `sent_with` got a 401.
    ///
    /// Concurrent callers join the refresh already in flight instead of
    /// starting their own. A caller whose token was rotated by an earlier
    /// refresh gets the current token back without a network call.
    pub async fn renew_session(&self, sent_with: Option<&str>) -> Renewal {
        let flight = {
            let mut slot = self.in_flight.lock().await;

            let existing = slot.clone();
            match existing {
                Some(flight) => {
                    tracing::debug!("Joining in-flight token refresh");
                    flight
                }
                None => {
                    let session = self.store.get().await;

                    if let Some(current) = session.access_token() {
                        if sent_with != Some(current) {
                            tracing::debug!("Access token already rotated, skipping refresh");
                            return Renewal::Renewed(current.to_string());
                        }
                    }

                    let refresh_token = match session.refresh_token() {
                        Some(token) => token.to_string(),
                        None => {
                            drop(slot);
                            tracing::warn!("No refresh token available, logging out");
                            self.logout.logout().await;
                            return Renewal::NoCredential;
                        }
                    };

                    // The refresh runs as its own task so it completes and
                    // releases the slot even if every waiter is cancelled
                    let task = tokio::spawn(run_refresh(
                        self.refresher.clone(),
                        self.store.clone(),
                        self.logout.clone(),
                        self.in_flight.clone(),
                        refresh_token,
                    ));
                    let flight = async move {
                        task.await.unwrap_or_else(|e| {
                            tracing::error!("Token refresh task failed: {}", e);
                            Err(RefreshError::Transport(format!("refresh task failed: {}", e)))
                        })
                    }
                    .boxed()
                    .shared();

                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        match flight.await {
            Ok(tokens) => Renewal::Renewed(tokens.access_token),
            Err(e) => Renewal::Failed(e),
        }
    }
}

/// Body of a shared refresh; its side effects run once per flight
async fn run_refresh(
    refresher: TokenRefreshClient,
    store: SessionStore,
    logout: LogoutHandler,
    in_flight: Arc<Mutex<Option<RefreshFlight>>>,
    refresh_token: String,
) -> Result<TokenPair, RefreshError> {
    let result = refresher.refresh(&refresh_token).await;

    match &result {
        Ok(tokens) => {
            let identity = store.get().await.identity().cloned();
            store
                .set(
                    tokens.access_token.clone(),
                    tokens.refresh_token.clone(),
                    identity,
                )
                .await;
        }
        Err(e) => {
            tracing::error!("Token refresh failed: {}", e);
            logout.logout().await;
        }
    }

    in_flight.lock().await.take();
    result
}
