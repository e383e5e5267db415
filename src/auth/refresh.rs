// Token refresh logic

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use std::time::Duration;

use super::token_prefix;
use super::types::{RefreshRequest, TokenPair, TokenResponse};
use crate::error::{extract_error_message, truncate_body, RefreshError};
use crate::http_client::user_agent;

/// Exchanges a refresh token for a new token pair.
///
/// Exactly one network attempt per call; retry policy belongs to the caller.
#[derive(Clone)]
pub struct TokenRefreshClient {
    client: Client,
    url: Url,
}

impl TokenRefreshClient {
    /// Create a refresh client for the API rooted at `base_url`
    pub fn new(base_url: &Url, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent())
            .build()
            .context("Failed to create HTTP client")?;

        Self::with_client(client, base_url)
    }

    /// Create a refresh client sharing an existing connection pool
    pub fn with_client(client: Client, base_url: &Url) -> Result<Self> {
        let url = base_url
            .join("auth/refresh")
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Perform one refresh call
    pub async fn refresh(&self, refresh_token: &str) -> std::result::Result<TokenPair, RefreshError> {
        tracing::info!("Refreshing access token...");

        let response = self
            .client
            .post(self.url.clone())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %self.url, "Failed to send refresh request");
                RefreshError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = extract_error_message(&error_text);
            let message = detail.clone().unwrap_or_else(|| {
                if error_text.trim().is_empty() {
                    status.canonical_reason().unwrap_or("refresh failed").to_string()
                } else {
                    truncate_body(error_text.trim())
                }
            });

            tracing::error!(
                status = status.as_u16(),
                body = %truncate_body(&error_text),
                "Token refresh rejected"
            );

            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message,
                detail,
            });
        }

        let data: TokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Malformed(e.to_string()))?;

        if data.access_token.is_empty() || data.refresh_token.is_empty() {
            return Err(RefreshError::Malformed(
                "response does not contain both access_token and refresh_token".to_string(),
            ));
        }

        tracing::info!(
            "Access token refreshed (token: {}...)",
            token_prefix(&data.access_token)
        );

        Ok(TokenPair {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
        })
    }
}
