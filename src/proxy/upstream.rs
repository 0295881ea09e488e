//! Self-healing upstream client
//!
//! Owns the outbound connection pool. The pool is rebuilt under a guarded
//! check-then-act sequence: a connection-level failure marks it broken, and
//! the next `ensure_healthy` call swaps in a fresh pool before the request
//! proceeds. This is a connection guard, not a retry policy — individual
//! requests are never retried.

use crate::proxy::types::{GatewayError, GatewayResult, UpstreamBaseUrl};
use axum::body::Body;
use http::Uri;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, Response};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

type PooledClient = hyper_util::client::legacy::Client<
    hyper_util::client::legacy::connect::HttpConnector,
    Body,
>;

pub struct UpstreamClient {
    base_url: UpstreamBaseUrl,
    request_timeout: Duration,
    pool: RwLock<PooledClient>,
    broken: AtomicBool,
}

impl UpstreamClient {
    pub fn new(base_url: UpstreamBaseUrl, request_timeout: Duration) -> Self {
        Self {
            base_url,
            request_timeout,
            pool: RwLock::new(Self::build_pool()),
            broken: AtomicBool::new(false),
        }
    }

    fn build_pool() -> PooledClient {
        hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .http1_title_case_headers(true)
            .http1_preserve_header_case(true)
            .build_http()
    }

    /// Guarded check-then-act: rebuild the connection pool if a previous
    /// request marked it broken. Called before each use.
    pub fn ensure_healthy(&self) {
        if self.broken.swap(false, Ordering::AcqRel) {
            let mut pool = self.pool.write();
            *pool = Self::build_pool();
            info!("upstream connection pool was broken, rebuilt");
        }
    }

    fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }

    /// Resolve a path-and-query against the upstream base URL
    pub fn uri_for(&self, path_and_query: &str) -> GatewayResult<Uri> {
        let url = format!(
            "{}{}",
            self.base_url.as_ref().trim_end_matches('/'),
            path_and_query
        );
        url.parse()
            .map_err(|_| GatewayError::Internal(format!("unresolvable upstream URL: {url}")))
    }

    async fn send(&self, request: Request<Body>) -> GatewayResult<Response<Incoming>> {
        let pool = self.pool.read().clone();
        let response = tokio::time::timeout(self.request_timeout, pool.request(request))
            .await
            .map_err(|_| GatewayError::Timeout(self.request_timeout))?
            .map_err(|e| {
                if e.is_connect() {
                    self.mark_broken();
                    warn!("upstream connection failed, pool marked for rebuild");
                }
                GatewayError::Transport(e.to_string())
            })?;
        Ok(response)
    }

    /// Buffered forward: send the full body, read the full response, and
    /// parse it as a single JSON document. Upstream statuses >= 400 become
    /// a structured error carrying the JSON-or-text body.
    pub async fn send_buffered(&self, request: Request<Body>) -> GatewayResult<Value> {
        let response = self.send(request).await?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| GatewayError::Transport(format!("reading upstream body: {e}")))?
            .to_bytes();

        if status.as_u16() >= 400 {
            return Err(GatewayError::Upstream {
                status,
                detail: detail_from_bytes(&bytes),
            });
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::Internal(format!("upstream sent non-JSON success: {e}")))
    }

    /// Streamed forward: the status line is checked before the body is
    /// consumed. On failure the body is drained and surfaced as the error
    /// detail; on success the untouched response is returned so the caller
    /// can relay its byte stream lazily (dropping it releases the upstream
    /// connection).
    pub async fn send_streamed(&self, request: Request<Body>) -> GatewayResult<Response<Incoming>> {
        let response = self.send(request).await?;
        let status = response.status();

        if status.as_u16() >= 400 {
            let bytes = response
                .into_body()
                .collect()
                .await
                .map_err(|e| GatewayError::Transport(format!("draining upstream error: {e}")))?
                .to_bytes();
            return Err(GatewayError::Upstream {
                status,
                detail: detail_from_bytes(&bytes),
            });
        }

        Ok(response)
    }

    /// Verbatim forward for non-messages traffic: status, headers and body
    /// are relayed exactly as upstream sent them, errors included.
    pub async fn send_verbatim(&self, request: Request<Body>) -> GatewayResult<Response<Incoming>> {
        self.send(request).await
    }
}

/// An upstream error body, as JSON when it parses and raw text otherwise
fn detail_from_bytes(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
