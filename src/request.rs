// Outgoing request description and the bearer-token interceptor

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;

use crate::auth::Session;
use crate::error::ApiError;

/// Correlation header the backend echoes into its logs
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A fully buffered HTTP call.
///
/// The body is held as `Bytes` so the request can always be replayed. The
/// attempt count is advanced by [`OutgoingRequest::replay`], which returns a
/// new value and leaves the original untouched.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    attempt: u32,
    request_id: String,
}

impl OutgoingRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            attempt: 0,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Serialize `body` as the JSON payload
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Append one query parameter
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous value
    pub fn with_bearer(mut self, token: &str) -> Self {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    "Access token is not a valid header value, sending without it"
                );
            }
        }
        self
    }

    /// The next attempt of this same logical request
    pub fn replay(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    pub fn is_replay(&self) -> bool {
        self.attempt > 0
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Token currently carried in the Authorization header
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    pub(crate) fn to_builder(&self, client: &Client) -> RequestBuilder {
        let mut builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());

        if let Ok(id) = HeaderValue::from_str(&self.request_id) {
            builder = builder.header(REQUEST_ID_HEADER, id);
        }
        if let Some(ref body) = self.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

/// Attach the session's access token to an outgoing request.
///
/// Without a token the request passes through unchanged; the backend's
/// rejection is handled further down the chain.
pub fn authorize(request: OutgoingRequest, session: &Session) -> OutgoingRequest {
    match session.access_token() {
        Some(token) => request.with_bearer(token),
        None => request,
    }
}
