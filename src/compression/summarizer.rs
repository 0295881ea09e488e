//! Best-effort summarization client
//!
//! One completion request per candidate: the fixed system instruction plus
//! the literal candidate text as the user turn. Every failure mode
//! (transport, status, malformed body, timeout) surfaces as a
//! `SummarizerError` that the coordinator absorbs by keeping the original
//! text; a summarizer fault never fails the surrounding request.

use crate::compression::prompts::{ANTHROPIC_VERSION, COMPRESSION_SYSTEM_PROMPT};
use crate::compression::tokens::TokenCounter;
use async_trait::async_trait;
use axum::body::Body;
use http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SummarizerError {
    #[error("summarization transport failure: {0}")]
    Transport(String),

    #[error("summarizer returned status {0}")]
    Status(StatusCode),

    #[error("malformed summarizer response: {0}")]
    Malformed(String),

    #[error("summarization timed out after {0:?}")]
    Timeout(Duration),
}

/// Seam between the coordinator and the real completion endpoint
#[async_trait]
pub trait Summarize: Send + Sync {
    /// Token-reducing rewrite of `text`; expected to preserve meaning
    async fn summarize(&self, text: &str) -> Result<String, SummarizerError>;
}

pub struct SummarizerClient {
    client: hyper_util::client::legacy::Client<
        hyper_util::client::legacy::connect::HttpConnector,
        Body,
    >,
    endpoint: String,
    api_key: String,
    model: String,
    max_summary_tokens: u32,
    timeout: Duration,
    counter: TokenCounter,
}

impl SummarizerClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        max_summary_tokens: u32,
        timeout: Duration,
    ) -> Self {
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build_http();

        Self {
            client,
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            api_key,
            model,
            max_summary_tokens,
            timeout,
            counter: TokenCounter::new(),
        }
    }

    fn build_request(&self, text: &str) -> Result<Request<Body>, SummarizerError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_summary_tokens,
            "system": COMPRESSION_SYSTEM_PROMPT,
            "messages": [{"role": "user", "content": text}],
        });
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| SummarizerError::Malformed(format!("request encoding: {e}")))?;

        Request::builder()
            .method(Method::POST)
            .uri(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .body(Body::from(bytes))
            .map_err(|e| SummarizerError::Transport(e.to_string()))
    }
}

/// Concatenated text blocks of a completion response
fn extract_text(document: &Value) -> Option<String> {
    let blocks = document.get("content")?.as_array()?;
    let mut out = String::new();
    for block in blocks {
        if block.get("type").and_then(Value::as_str) == Some("text") {
            if let Some(text) = block.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[async_trait]
impl Summarize for SummarizerClient {
    async fn summarize(&self, text: &str) -> Result<String, SummarizerError> {
        let request = self.build_request(text)?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| SummarizerError::Timeout(self.timeout))?
            .map_err(|e| SummarizerError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| SummarizerError::Transport(e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            return Err(SummarizerError::Status(status));
        }

        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| SummarizerError::Malformed(e.to_string()))?;
        let summary = extract_text(&document)
            .ok_or_else(|| SummarizerError::Malformed("no text content blocks".to_string()))?;

        debug!(
            tokens_before = self.counter.count(text),
            tokens_after = self.counter.count(&summary),
            "summarization call completed"
        );

        Ok(summary)
    }
}
