//! End-to-end compression through the gateway: a mock summarization endpoint
//! produces replacements, a mock upstream receives the rewritten payload.

use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use mockito::Matcher;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokengate::compression::{
    CacheCapacity, CompressionCache, CompressionCoordinator, MinTokenThreshold, SummarizerClient,
};
use tokengate::proxy::{ProxyService, UpstreamBaseUrl, UpstreamClient};
use tower::ServiceExt;

const LONG_TEXT: &str = "Please review the following deployment log in detail and highlight \
    anything unusual: service a restarted twice, service b reported a slow disk, and the \
    nightly backup finished forty minutes later than its usual window.";

fn compressing_router(upstream_url: &str, summarizer_url: &str) -> Router {
    let upstream = UpstreamClient::new(
        UpstreamBaseUrl::try_new(upstream_url.to_string()).unwrap(),
        Duration::from_secs(5),
    );
    let cache = Arc::new(CompressionCache::new(CacheCapacity::try_new(16).unwrap()));
    let summarizer = SummarizerClient::new(
        summarizer_url,
        "sk-summarizer".to_string(),
        "test-model".to_string(),
        256,
        Duration::from_secs(5),
    );
    let coordinator = CompressionCoordinator::new(
        cache.clone(),
        Arc::new(summarizer),
        MinTokenThreshold::try_new(4).unwrap(),
    );
    ProxyService::new(upstream, Some(coordinator), cache, None, 1024 * 1024).into_router()
}

fn post_messages(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/v1/messages")
        .header("content-type", "application/json")
        .header("x-api-key", "sk-caller")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn summary_response(text: &str) -> String {
    json!({"content": [{"type": "text", "text": text}]}).to_string()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn long_text_is_replaced_before_reaching_upstream() {
    let mut summarizer = mockito::Server::new_async().await;
    let summarizer_mock = summarizer
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "sk-summarizer")
        .with_status(200)
        .with_body(summary_response("deployment log: minor anomalies"))
        .create_async()
        .await;

    let mut upstream = mockito::Server::new_async().await;
    let upstream_mock = upstream
        .mock("POST", "/v1/messages")
        .match_body(Matcher::PartialJson(json!({
            "messages": [{"role": "user", "content": "deployment log: minor anomalies"}]
        })))
        .with_status(200)
        .with_body(r#"{"id":"msg_1"}"#)
        .create_async()
        .await;

    let response = compressing_router(&upstream.url(), &summarizer.url())
        .oneshot(post_messages(json!({
            "model": "claude-sonnet-4",
            "messages": [{"role": "user", "content": LONG_TEXT}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], json!("msg_1"));
    summarizer_mock.assert_async().await;
    upstream_mock.assert_async().await;
}

#[tokio::test]
async fn repeated_text_is_summarized_once() {
    let mut summarizer = mockito::Server::new_async().await;
    let summarizer_mock = summarizer
        .mock("POST", "/v1/messages")
        .expect(1)
        .with_status(200)
        .with_body(summary_response("the gist"))
        .create_async()
        .await;

    let mut upstream = mockito::Server::new_async().await;
    let upstream_mock = upstream
        .mock("POST", "/v1/messages")
        .expect(2)
        .with_status(200)
        .with_body(r#"{"id":"msg_1"}"#)
        .create_async()
        .await;

    let router = compressing_router(&upstream.url(), &summarizer.url());
    let payload = json!({"messages": [{"role": "user", "content": LONG_TEXT}]});

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(post_messages(payload.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    summarizer_mock.assert_async().await;
    upstream_mock.assert_async().await;
}

#[tokio::test]
async fn tool_use_blocks_are_never_summarized() {
    let mut summarizer = mockito::Server::new_async().await;
    let summarizer_mock = summarizer
        .mock("POST", "/v1/messages")
        .expect(0)
        .create_async()
        .await;

    let mut upstream = mockito::Server::new_async().await;
    upstream
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(r#"{"id":"msg_1"}"#)
        .create_async()
        .await;

    let response = compressing_router(&upstream.url(), &summarizer.url())
        .oneshot(post_messages(json!({
            "messages": [{
                "role": "assistant",
                "content": [{
                    "type": "tool_use",
                    "id": "tu_1",
                    "name": "search",
                    "input": {"query": LONG_TEXT}
                }]
            }]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    summarizer_mock.assert_async().await;
}

#[tokio::test]
async fn short_text_is_forwarded_byte_identical() {
    let mut summarizer = mockito::Server::new_async().await;
    let summarizer_mock = summarizer
        .mock("POST", "/v1/messages")
        .expect(0)
        .create_async()
        .await;

    let request_body = r#"{"messages":[{"role":"user","content":"hi"}]}"#;
    let mut upstream = mockito::Server::new_async().await;
    let upstream_mock = upstream
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Exact(request_body.to_string()))
        .with_status(200)
        .with_body(r#"{"id":"msg_1"}"#)
        .create_async()
        .await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/messages")
        .header("content-type", "application/json")
        .body(Body::from(request_body))
        .unwrap();
    let response = compressing_router(&upstream.url(), &summarizer.url())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    summarizer_mock.assert_async().await;
    upstream_mock.assert_async().await;
}

#[tokio::test]
async fn summarizer_outage_degrades_to_pass_through() {
    let mut summarizer = mockito::Server::new_async().await;
    summarizer
        .mock("POST", "/v1/messages")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let mut upstream = mockito::Server::new_async().await;
    let upstream_mock = upstream
        .mock("POST", "/v1/messages")
        .match_body(Matcher::PartialJson(json!({
            "messages": [{"role": "user", "content": LONG_TEXT}]
        })))
        .with_status(200)
        .with_body(r#"{"id":"msg_1"}"#)
        .create_async()
        .await;

    let response = compressing_router(&upstream.url(), &summarizer.url())
        .oneshot(post_messages(json!({
            "messages": [{"role": "user", "content": LONG_TEXT}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    upstream_mock.assert_async().await;
}
