//! Client identity extraction for rate limiting.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Identity used when no peer address is known.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Resolve the rate limit identity for a request.
///
/// The peer IP address is used by default. With `trust_forwarded_for`, the
/// left-most `X-Forwarded-For` entry wins when it parses as an IP address.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:51000".parse().unwrap())
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_peer_ip_without_port() {
        assert_eq!(client_identity(&HeaderMap::new(), peer(), false), "192.0.2.10");
    }

    #[test]
    fn test_forwarded_for_ignored_unless_trusted() {
        let headers = forwarded("203.0.113.7");
        assert_eq!(client_identity(&headers, peer(), false), "192.0.2.10");
    }

    #[test]
    fn test_forwarded_for_first_hop_when_trusted() {
        let headers = forwarded("203.0.113.7, 10.0.0.1");
        assert_eq!(client_identity(&headers, peer(), true), "203.0.113.7");
    }

    #[test]
    fn test_unparseable_forwarded_for_falls_back_to_peer() {
        let headers = forwarded("not-an-ip");
        assert_eq!(client_identity(&headers, peer(), true), "192.0.2.10");
    }

    #[test]
    fn test_ipv6_forwarded_for() {
        let headers = forwarded("2001:db8::1");
        assert_eq!(client_identity(&headers, None, true), "2001:db8::1");
    }

    #[test]
    fn test_unknown_without_peer() {
        assert_eq!(client_identity(&HeaderMap::new(), None, false), UNKNOWN_IDENTITY);
    }
}
