//! HTTP header handling and path constants for the gateway

use http::{header, HeaderMap};

/// Well-known paths
pub mod paths {
    /// The compression-aware messages endpoint
    pub const MESSAGES: &str = "/v1/messages";

    /// Health check endpoint path
    pub const HEALTH: &str = "/health";
}

/// Inbound headers prepared for forwarding: hop-specific fields are
/// stripped (the connector sets its own `host`, hyper recomputes
/// `content-length` from the outbound body), everything else — including
/// auth — passes through unchanged.
pub fn strip_hop_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = inbound.clone();
    outbound.remove(header::HOST);
    outbound.remove(header::CONTENT_LENGTH);
    outbound
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn hop_headers_are_stripped_and_the_rest_pass_through() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("localhost:8000"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        inbound.insert("x-api-key", HeaderValue::from_static("sk-ant-secret"));
        inbound.insert(
            "anthropic-version",
            HeaderValue::from_static("2023-06-01"),
        );

        let outbound = strip_hop_headers(&inbound);

        assert!(!outbound.contains_key(header::HOST));
        assert!(!outbound.contains_key(header::CONTENT_LENGTH));
        assert_eq!(
            outbound.get("x-api-key").unwrap(),
            &HeaderValue::from_static("sk-ant-secret")
        );
        assert_eq!(
            outbound.get("anthropic-version").unwrap(),
            &HeaderValue::from_static("2023-06-01")
        );
    }
}
