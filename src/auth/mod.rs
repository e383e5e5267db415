// Authentication module
// Session state, token refresh, logout and session persistence

mod logout;
mod manager;
mod refresh;
mod store;
mod types;

pub mod credentials;

pub use logout::{LogoutHandler, SessionExpiredCallback};
pub use manager::{AuthManager, Renewal};
pub use refresh::TokenRefreshClient;
pub use store::SessionStore;
pub use types::{Identity, LoginRequest, Session, TokenPair, TokenResponse};

/// Short, log-safe prefix of a token
pub(crate) fn token_prefix(token: &str) -> String {
    token.chars().take(8).collect()
}
