//! Gateway routing and request handling
//!
//! Three routes: `/v1/messages` is buffered, optionally compressed, and
//! forwarded; `/health` answers locally (and can dump a cache snapshot for
//! inspection); everything else is relayed verbatim. When compression is off
//! or applies no replacement, the original request bytes are forwarded
//! untouched rather than a re-serialized copy.

use crate::compression::{
    CacheCapacity, CompressionCache, CompressionCoordinator, MinTokenThreshold, SummarizerClient,
};
use crate::config::Settings;
use crate::error::Error;
use crate::payload::MessagesPayload;
use crate::proxy::headers::{paths, strip_hop_headers};
use crate::proxy::types::{GatewayError, GatewayResult, RequestId, UpstreamBaseUrl};
use crate::proxy::upstream::UpstreamClient;
use axum::body::Body;
use bytes::Bytes;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::request::Parts;
use http::Method;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

pub struct ProxyService {
    upstream: UpstreamClient,
    coordinator: Option<CompressionCoordinator>,
    cache: Arc<CompressionCache>,
    cache_dump_path: Option<String>,
    max_request_bytes: usize,
}

impl ProxyService {
    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        let base_url = UpstreamBaseUrl::try_new(settings.upstream.base_url.clone())
            .map_err(|e| Error::InvalidConfig(format!("upstream.base_url: {e}")))?;
        let upstream = UpstreamClient::new(
            base_url,
            Duration::from_secs(settings.upstream.request_timeout_secs),
        );

        let capacity = CacheCapacity::try_new(settings.compression.cache_capacity)
            .map_err(|e| Error::InvalidConfig(format!("compression.cache_capacity: {e}")))?;
        let cache = Arc::new(CompressionCache::new(capacity));

        // Compression needs both the feature switch and a credential;
        // otherwise the gateway degrades to pure pass-through.
        let coordinator = match (&settings.summarizer.api_key, settings.compression.enabled) {
            (Some(api_key), true) => {
                let min_tokens = MinTokenThreshold::try_new(settings.compression.min_tokens)
                    .map_err(|e| Error::InvalidConfig(format!("compression.min_tokens: {e}")))?;
                let summarizer = SummarizerClient::new(
                    settings.summarizer_base_url(),
                    api_key.clone(),
                    settings.summarizer.model.clone(),
                    settings.summarizer.max_summary_tokens,
                    Duration::from_secs(settings.summarizer.timeout_secs),
                );
                Some(CompressionCoordinator::new(
                    cache.clone(),
                    Arc::new(summarizer),
                    min_tokens,
                ))
            }
            (None, true) => {
                warn!("no summarizer credential configured, compression disabled");
                None
            }
            (_, false) => {
                info!("compression disabled by configuration");
                None
            }
        };

        Ok(Self {
            upstream,
            coordinator,
            cache,
            cache_dump_path: settings.compression.cache_dump_path.clone(),
            max_request_bytes: settings.upstream.max_request_bytes,
        })
    }

    pub fn new(
        upstream: UpstreamClient,
        coordinator: Option<CompressionCoordinator>,
        cache: Arc<CompressionCache>,
        cache_dump_path: Option<String>,
        max_request_bytes: usize,
    ) -> Self {
        Self {
            upstream,
            coordinator,
            cache,
            cache_dump_path,
            max_request_bytes,
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route(paths::MESSAGES, post(messages_handler))
            .route(paths::HEALTH, get(health_handler))
            .fallback(forward_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::new(self))
    }

    /// Read the inbound body, enforcing the configured size cap
    async fn collect_body(&self, body: Body) -> GatewayResult<Bytes> {
        let collected = Limited::new(body, self.max_request_bytes)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    GatewayError::RequestTooLarge {
                        max: self.max_request_bytes,
                    }
                } else {
                    GatewayError::Internal(format!("reading request body: {e}"))
                }
            })?;
        Ok(collected.to_bytes())
    }

    /// The body to forward for a messages request: the re-serialized payload
    /// when compression changed something, the untouched original bytes
    /// otherwise.
    async fn prepare_body(
        &self,
        original: Bytes,
        mut payload: MessagesPayload,
    ) -> GatewayResult<Bytes> {
        let Some(coordinator) = &self.coordinator else {
            return Ok(original);
        };

        let applied = coordinator.compress_messages(&mut payload).await;
        if applied == 0 {
            debug!("no replacement applied, forwarding original bytes");
            return Ok(original);
        }

        info!(applied, "forwarding compressed payload");
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| GatewayError::Internal(format!("re-encoding payload: {e}")))?;
        Ok(Bytes::from(bytes))
    }

    fn outbound_request(
        &self,
        method: Method,
        path_and_query: &str,
        inbound: &Parts,
        body: Bytes,
    ) -> GatewayResult<http::Request<Body>> {
        let uri = self.upstream.uri_for(path_and_query)?;
        let mut request = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))?;
        *request.headers_mut() = strip_hop_headers(&inbound.headers);
        Ok(request)
    }

    async fn dump_cache_if_configured(&self) {
        let Some(path) = &self.cache_dump_path else {
            return;
        };
        let snapshot = self.cache.snapshot();
        let dump = json!({
            "dumped_at": chrono::Utc::now().to_rfc3339(),
            "entries": snapshot.len(),
            "cache": snapshot,
        });
        match serde_json::to_vec_pretty(&dump) {
            Ok(bytes) => {
                if let Err(error) = tokio::fs::write(path, bytes).await {
                    warn!(%error, path, "failed to write cache dump");
                }
            }
            Err(error) => warn!(%error, "failed to encode cache dump"),
        }
    }
}

/// The compression-aware messages route
#[instrument(skip_all, fields(request_id = %RequestId::new()))]
async fn messages_handler(
    State(service): State<Arc<ProxyService>>,
    request: Request,
) -> GatewayResult<Response> {
    service.upstream.ensure_healthy();

    let (parts, body) = request.into_parts();
    let original = service.collect_body(body).await?;

    let payload: MessagesPayload = serde_json::from_slice(&original)
        .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
    let streaming = payload.stream.unwrap_or(false);

    let forward_body = service.prepare_body(original, payload).await?;
    let outbound =
        service.outbound_request(Method::POST, paths::MESSAGES, &parts, forward_body)?;

    if streaming {
        let response = service.upstream.send_streamed(outbound).await?;
        let (mut parts, body) = response.into_parts();
        parts.headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/event-stream"),
        );
        parts.headers.insert(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("no-cache"),
        );
        Ok(Response::from_parts(parts, Body::new(body)))
    } else {
        let document = service.upstream.send_buffered(outbound).await?;
        Ok(Json(document).into_response())
    }
}

/// Verbatim relay for every other path, errors included
#[instrument(skip_all, fields(request_id = %RequestId::new(), path = %request.uri().path()))]
async fn forward_handler(
    State(service): State<Arc<ProxyService>>,
    request: Request,
) -> GatewayResult<Response> {
    service.upstream.ensure_healthy();

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let (parts, body) = request.into_parts();
    let bytes = service.collect_body(body).await?;
    let outbound =
        service.outbound_request(parts.method.clone(), &path_and_query, &parts, bytes)?;

    let response = service.upstream.send_verbatim(outbound).await?;
    let (parts, body) = response.into_parts();
    Ok(Response::from_parts(parts, Body::new(body)))
}

/// Liveness probe; answered locally, never forwarded
async fn health_handler(State(service): State<Arc<ProxyService>>) -> Response {
    service.dump_cache_if_configured().await;
    Json(json!({ "status": "healthy" })).into_response()
}
