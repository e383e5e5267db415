// Error handling module
// Defines client error types and backend error-body parsing

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Message shown when a failure carries nothing readable
pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors returned to callers of the panel client
#[derive(Error, Debug)]
pub enum ApiError {
    /// No response was received (connect failure, timeout, broken body)
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered 401
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        detail: Option<String>,
    },

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    /// The credential refresh itself failed; the session has been torn down
    #[error("Session refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    /// Success status, but the body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built (bad path, bad header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Failure of a single refresh attempt.
///
/// Cloneable so one outcome can be handed to every request waiting on the
/// same in-flight refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("refresh rejected ({status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    #[error("malformed refresh response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Classify a non-success response
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = extract_error_message(body);
        let message = detail
            .clone()
            .unwrap_or_else(|| fallback_body_message(status, body));

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message, detail },
            _ => ApiError::Http {
                status: status.as_u16(),
                message,
                detail,
            },
        }
    }

    /// True for the 401-equivalent that drives the refresh path
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// HTTP status of the failure, when there was a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::RefreshFailed(RefreshError::Rejected { status, .. }) => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Human-readable message supplied by the backend, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { detail, .. } | ApiError::Http { detail, .. } => {
                detail.as_deref()
            }
            ApiError::RefreshFailed(RefreshError::Rejected { detail, .. }) => detail.as_deref(),
            _ => None,
        }
    }

    /// Message for display: backend detail, else the generic fallback
    pub fn display_message(&self) -> String {
        self.display_message_or(FALLBACK_MESSAGE)
    }

    /// Message for display with a caller-chosen fallback
    pub fn display_message_or(&self, fallback: &str) -> String {
        self.detail()
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Extract the user-facing message from a backend error body.
///
/// Precedence: `error.detail`, then `detail`. Validation errors carry a list
/// of objects instead of a string; their `msg` fields are joined.
pub fn extract_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;

    json.get("error")
        .and_then(|e| e.get("detail"))
        .and_then(detail_text)
        .or_else(|| json.get("detail").and_then(detail_text))
}

fn detail_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}

fn fallback_body_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string()
    } else {
        truncate_body(trimmed)
    }
}

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        None => body.to_string(),
        Some((cut, _)) => format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        ),
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
