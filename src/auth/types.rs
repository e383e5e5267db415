// Authentication types

use serde::{Deserialize, Serialize};

use crate::models::User;

/// The authenticated user attached to a session
pub type Identity = User;

/// Access/refresh credential pair. Both halves always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Snapshot of the client session.
///
/// The token pair is a single optional value, so a session can never hold an
/// access token without its refresh token or the other way round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    tokens: Option<TokenPair>,
    identity: Option<Identity>,
}

impl Session {
    /// Session for a freshly issued token pair
    pub fn authenticated(tokens: TokenPair, identity: Option<Identity>) -> Self {
        Self {
            tokens: Some(tokens),
            identity,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh_token.as_str())
    }

    pub fn tokens(&self) -> Option<&TokenPair> {
        self.tokens.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    /// True once every field has been cleared
    pub fn is_empty(&self) -> bool {
        self.tokens.is_none() && self.identity.is_none()
    }
}

/// Body of `POST /auth/refresh`
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Token response from `/auth/login` and `/auth/refresh`
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body of `POST /auth/login`
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_code: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        }
    }

    #[test]
    fn test_default_session_is_empty() {
        let session = Session::default();
        assert!(session.is_empty());
        assert!(!session.is_authenticated());
        assert_eq!(session.access_token(), None);
        assert_eq!(session.refresh_token(), None);
    }

    #[test]
    fn test_authenticated_session_exposes_both_tokens() {
        let session = Session::authenticated(pair("A1", "R1"), None);
        assert!(session.is_authenticated());
        assert!(!session.is_empty());
        assert_eq!(session.access_token(), Some("A1"));
        assert_eq!(session.refresh_token(), Some("R1"));
        assert_eq!(session.identity(), None);
    }

    #[test]
    fn test_login_request_omits_missing_totp() {
        let body = LoginRequest {
            email: "a@b.c",
            password: "pw",
            totp_code: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("totp_code").is_none());
    }

    #[test]
    fn test_token_response_ignores_extra_fields() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token": "A2", "refresh_token": "R2", "token_type": "bearer"}"#,
        )
        .unwrap();
        assert_eq!(response.access_token, "A2");
        assert_eq!(response.refresh_token, "R2");
    }
}
