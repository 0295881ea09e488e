//! Type definitions for the proxy module

use http::StatusCode;
use nutype::nutype;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Base URL of the single upstream host every request is forwarded to
#[nutype(
    sanitize(trim),
    validate(predicate = |s: &str| s.starts_with("http://") || s.starts_with("https://")),
    derive(Clone, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
)]
pub struct UpstreamBaseUrl(String);

/// Request ID for log correlation
#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for RequestId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl AsRef<Uuid> for RequestId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl RequestId {
    /// Create a new RequestId with a v7 UUID
    pub fn new() -> Self {
        Self::from(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors surfaced to the caller by the gateway.
///
/// Summarizer faults never appear here: compression failures are absorbed
/// locally and the original text is forwarded instead.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed inbound payload; never reaches upstream
    #[error("invalid request payload: {0}")]
    InvalidPayload(String),

    #[error("request body too large (max {max} bytes)")]
    RequestTooLarge { max: usize },

    /// Upstream answered >= 400; status and body are relayed verbatim
    #[error("upstream returned status {status}")]
    Upstream { status: StatusCode, detail: Value },

    /// Connection-level failure talking to upstream
    #[error("upstream transport failure: {0}")]
    Transport(String),

    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
