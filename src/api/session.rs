// Login and user-initiated logout

use super::{decode, PanelApi};
use crate::auth::{Identity, LoginRequest, TokenResponse};
use crate::error::{ApiError, Result};
use crate::request::OutgoingRequest;

/// Detail the backend returns when a 2FA account logs in without a code
const TOTP_REQUIRED_DETAIL: &str = "2FA code required";

/// True when a login failed only because the TOTP code is missing
pub fn is_totp_required(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::Http { status: 400, detail: Some(detail), .. } if detail == TOTP_REQUIRED_DETAIL
    )
}

impl PanelApi {
    /// Exchange credentials for a session and load the user's identity.
    ///
    /// Both calls skip the refresh path: a rejected password is reported as
    /// is and never triggers a token refresh.
    pub async fn login(&self, email: &str, password: &str, totp_code: Option<&str>) -> Result<Identity> {
        let request = OutgoingRequest::post(self.http.endpoint("auth/login")?).json(&LoginRequest {
            email,
            password,
            totp_code,
        })?;

        let response = self.http.request_no_refresh(request).await?;
        let tokens: TokenResponse = decode(response).await?;

        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "login response is missing a token".to_string(),
            ));
        }

        let request = OutgoingRequest::get(self.http.endpoint("auth/me")?)
            .with_bearer(&tokens.access_token);
        let identity: Identity = decode(self.http.request_no_refresh(request).await?).await?;

        self.store()
            .set(tokens.access_token, tokens.refresh_token, Some(identity.clone()))
            .await;

        tracing::info!(user = %identity.email, role = %identity.role, "Logged in");
        Ok(identity)
    }

    /// End the session on request of the user.
    ///
    /// The backend call is best effort; the local session is cleared either
    /// way. The session-expired callback is not fired.
    pub async fn logout(&self) {
        let session = self.store().get().await;

        if let Some(token) = session.access_token() {
            match self.http.endpoint("auth/logout") {
                Ok(url) => {
                    let request = OutgoingRequest::post(url).with_bearer(token);
                    if let Err(e) = self.http.request_no_refresh(request).await {
                        tracing::debug!(error = %e, "Backend logout failed, clearing locally");
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Skipping backend logout"),
            }
        }

        self.store().clear().await;
        tracing::info!("Logged out");
    }
}
