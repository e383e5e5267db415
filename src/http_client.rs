use anyhow::{Context, Result};
use reqwest::{Client, Response, Url};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthManager;
use crate::auth::Renewal;
use crate::error::{truncate_body, ApiError};
use crate::request::{authorize, OutgoingRequest};

/// Callback receiving backend error messages meant for the user
pub type ErrorReporter = Arc<dyn Fn(&str) + Send + Sync>;

/// HTTP client for the panel API with session refresh and replay
pub struct PanelHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// API root, always ending in `/`
    base_url: Url,

    /// Authentication manager
    auth_manager: Arc<AuthManager>,

    /// Receives messages from non-auth failures
    error_reporter: Option<ErrorReporter>,
}

impl PanelHttpClient {
    /// Create a new HTTP client
    pub fn new(
        auth_manager: Arc<AuthManager>,
        base_url: &Url,
        max_connections: usize,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .user_agent(user_agent())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.clone(),
            auth_manager,
            error_reporter: None,
        })
    }

    /// Route user-facing error messages to `reporter`
    pub fn with_error_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.error_reporter = Some(Arc::new(reporter));
        self
    }

    /// Absolute URL for an API path such as `vps/3/start`
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid path '{}': {}", path, e)))
    }

    pub fn auth_manager(&self) -> &Arc<AuthManager> {
        &self.auth_manager
    }

    /// Execute an authenticated request
    /// Automatically handles:
    /// - attaching the current access token
    /// - 401: refreshes the session once and replays the request once
    /// - 401 without a refresh token, or a failed refresh: logs the session out
    pub async fn request_with_refresh(&self, request: OutgoingRequest) -> Result<Response, ApiError> {
        let session = self.auth_manager.store().get().await;
        let request = authorize(request, &session);

        let error = match self.dispatch(&request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        if !error.is_unauthorized() {
            return Err(error);
        }

        if request.is_replay() {
            tracing::warn!(
                request_id = %request.request_id(),
                "Replayed request rejected again, giving up"
            );
            return Err(error);
        }

        let replay = request.replay();
        tracing::warn!(
            request_id = %request.request_id(),
            "Received 401, refreshing session and replaying..."
        );

        match self.auth_manager.renew_session(request.bearer()).await {
            Renewal::Renewed(token) => {
                let replay = replay.with_bearer(&token);
                let result = self.dispatch(&replay).await;
                if matches!(result, Err(ApiError::Unauthorized { .. })) {
                    tracing::warn!(
                        request_id = %replay.request_id(),
                        "Replayed request rejected again, giving up"
                    );
                }
                result
            }
            Renewal::NoCredential => Err(error),
            Renewal::Failed(e) => Err(ApiError::RefreshFailed(e)),
        }
    }

    /// Execute a request as given: no session token, no refresh, no replay.
    /// Used for login and for calls that carry their own credentials.
    pub async fn request_no_refresh(&self, request: OutgoingRequest) -> Result<Response, ApiError> {
        self.dispatch(&request).await
    }

    /// Send one attempt and classify the outcome
    async fn dispatch(&self, request: &OutgoingRequest) -> Result<Response, ApiError> {
        let method = request.method().clone();
        let url = request.url().clone();

        tracing::debug!(
            method = %method,
            url = %url,
            attempt = request.attempt() + 1,
            request_id = %request.request_id(),
            "Sending HTTP request"
        );

        let response = match request.to_builder(&self.client).send().await {
            Ok(response) => response,
            Err(e) => {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else if e.is_body() {
                    "body_error"
                } else {
                    "unknown"
                };

                tracing::warn!(
                    error_kind = error_kind,
                    error = %e,
                    url = %url,
                    request_id = %request.request_id(),
                    "HTTP request error"
                );
                return Err(ApiError::Transport(e));
            }
        };

        let status = response.status();
        tracing::debug!(status = %status, "Received HTTP response");

        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let error = ApiError::from_status(status, &error_text);

        tracing::warn!(
            status = status.as_u16(),
            method = %method,
            url = %url,
            attempt = request.attempt() + 1,
            request_id = %request.request_id(),
            response_body = %truncate_body(&error_text),
            "HTTP request failed with error response"
        );

        if !error.is_unauthorized() {
            self.report(&error);
        }

        Err(error)
    }

    /// Surface the backend's message for display
    fn report(&self, error: &ApiError) {
        if let (Some(reporter), Some(message)) = (&self.error_reporter, error.detail()) {
            reporter(message);
        }
    }
}

/// Normalize an API root so relative joins stay under it
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("Invalid API URL: {}", raw))?;

    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("API URL must use http or https: {}", raw);
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// User-Agent for every call: crate version plus host name
pub(crate) fn user_agent() -> String {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!("vps-panel/{} ({})", env!("CARGO_PKG_VERSION"), hostname)
}
