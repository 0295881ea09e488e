//! HTTP rendering of gateway errors
//!
//! Every failure leaves the gateway as a JSON envelope of the form
//! `{"detail": ...}`. For relayed upstream errors the detail carries the
//! upstream body unmodified and the status line matches upstream's.

use crate::proxy::types::GatewayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, warn};

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream { status, .. } => *status,
            Self::Transport(_) | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> Value {
        match self {
            Self::Upstream { detail, .. } => detail.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Upstream { .. } => warn!(%status, "relaying upstream error"),
            Self::InvalidPayload(_) | Self::RequestTooLarge { .. } => {
                warn!(%status, error = %self, "rejecting request")
            }
            _ => error!(%status, error = %self, "request failed"),
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}
