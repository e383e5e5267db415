// Panel API
// Typed calls over the authenticated HTTP client

mod session;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::SessionStore;
use crate::error::{truncate_body, ApiError, Result};
use crate::http_client::PanelHttpClient;
use crate::models::{DashboardStats, Host, HostStats, Image, User, Vps, VpsCreate, VpsQuery};
use crate::request::OutgoingRequest;

pub use session::is_totp_required;

/// Lifecycle actions accepted by `POST /vps/{id}/{action}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpsAction {
    Start,
    Stop,
    Reboot,
}

impl VpsAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VpsAction::Start => "start",
            VpsAction::Stop => "stop",
            VpsAction::Reboot => "reboot",
        }
    }
}

/// Client for the panel's REST endpoints.
///
/// Every call except login goes through the refresh-and-replay path, so an
/// expired access token is renewed transparently.
#[derive(Clone)]
pub struct PanelApi {
    http: Arc<PanelHttpClient>,
}

impl PanelApi {
    pub fn new(http: Arc<PanelHttpClient>) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &PanelHttpClient {
        &self.http
    }

    pub fn store(&self) -> &SessionStore {
        self.http.auth_manager().store()
    }

    async fn get<T: DeserializeOwned>(&self, request: OutgoingRequest) -> Result<T> {
        let response = self.http.request_with_refresh(request).await?;
        decode(response).await
    }

    // ----- users -----

    /// Current user, `GET /auth/me`
    pub async fn me(&self) -> Result<User> {
        let url = self.http.endpoint("auth/me")?;
        self.get(OutgoingRequest::get(url)).await
    }

    pub async fn list_users(&self, limit: Option<u32>) -> Result<Vec<User>> {
        let mut request = OutgoingRequest::get(self.http.endpoint("users")?);
        if let Some(limit) = limit {
            request = request.query("limit", &limit.to_string());
        }
        self.get(request).await
    }

    // ----- vps -----

    pub async fn list_vps(&self, query: &VpsQuery) -> Result<Vec<Vps>> {
        let request = query
            .pairs()
            .into_iter()
            .fold(OutgoingRequest::get(self.http.endpoint("vps")?), |req, (key, value)| {
                req.query(key, &value)
            });
        self.get(request).await
    }

    pub async fn get_vps(&self, id: i64) -> Result<Vps> {
        let url = self.http.endpoint(&format!("vps/{}", id))?;
        self.get(OutgoingRequest::get(url)).await
    }

    pub async fn create_vps(&self, body: &VpsCreate) -> Result<Vps> {
        let request = OutgoingRequest::post(self.http.endpoint("vps")?).json(body)?;
        self.get(request).await
    }

    /// Run a lifecycle action; the backend answers with a free-form status object
    pub async fn vps_action(&self, id: i64, action: VpsAction) -> Result<Value> {
        let url = self
            .http
            .endpoint(&format!("vps/{}/{}", id, action.as_str()))?;
        self.get(OutgoingRequest::post(url)).await
    }

    pub async fn delete_vps(&self, id: i64) -> Result<()> {
        let url = self.http.endpoint(&format!("vps/{}", id))?;
        self.http
            .request_with_refresh(OutgoingRequest::delete(url))
            .await?;
        Ok(())
    }

    // ----- hosts -----

    pub async fn list_hosts(&self) -> Result<Vec<Host>> {
        let url = self.http.endpoint("hosts")?;
        self.get(OutgoingRequest::get(url)).await
    }

    pub async fn host_stats(&self) -> Result<HostStats> {
        let url = self.http.endpoint("hosts/stats")?;
        self.get(OutgoingRequest::get(url)).await
    }

    pub async fn get_host(&self, id: i64) -> Result<Host> {
        let url = self.http.endpoint(&format!("hosts/{}", id))?;
        self.get(OutgoingRequest::get(url)).await
    }

    // ----- images -----

    pub async fn list_images(&self, limit: Option<u32>) -> Result<Vec<Image>> {
        let mut request = OutgoingRequest::get(self.http.endpoint("images")?);
        if let Some(limit) = limit {
            request = request.query("limit", &limit.to_string());
        }
        self.get(request).await
    }

    // ----- admin -----

    pub async fn admin_dashboard(&self) -> Result<DashboardStats> {
        let url = self.http.endpoint("admin/dashboard")?;
        self.get(OutgoingRequest::get(url)).await
    }
}

/// Read a success body as JSON of the expected shape
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(error = %e, body = %truncate_body(&body), "Unexpected response body");
        ApiError::InvalidResponse(e.to_string())
    })
}
