//! Gateway HTTP surface and upstream forwarding
//!
//! The gateway owns three routes: the compression-aware messages path, a
//! liveness probe, and a verbatim fallback for everything else. Forwarding
//! goes through a single self-healing upstream client in buffered, streamed,
//! or verbatim mode.

pub mod error_response;
pub mod headers;
pub mod service;
pub mod types;
pub mod upstream;

pub use service::ProxyService;
pub use types::{GatewayError, GatewayResult, RequestId, UpstreamBaseUrl};
pub use upstream::UpstreamClient;
