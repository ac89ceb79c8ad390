//! Per-IP rate limiting using governor and `tower_governor`.
//!
//! Off by default. When enabled, every request spends one token from its
//! client IP's bucket; an empty bucket answers HTTP 429.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::config::RateLimitConfig;

/// Proxy headers carrying the client IP, in order of trust.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "fly-client-ip"];

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Key extractor that reads the client IP from proxy headers.
///
/// Checks `CF-Connecting-IP`, then the first `X-Forwarded-For` entry, then
/// `X-Real-IP` and `Fly-Client-IP`, and finally the socket peer address.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req).ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Best-effort client IP for a request.
pub fn client_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    let headers = req.headers();
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    // Cloudflare's real client IP
    if let Some(ip) = header_ip(CLIENT_IP_HEADERS[0]) {
        return Some(ip);
    }

    // First hop of X-Forwarded-For
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    CLIENT_IP_HEADERS[1..]
        .iter()
        .find_map(|name| header_ip(name))
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Build the rate limiter, or `None` when rate limiting is disabled.
///
/// `per_second` is the replenish period: one token every `per_second`
/// seconds, with up to `burst` tokens banked.
#[must_use]
pub fn rate_limiter(config: &RateLimitConfig) -> Option<RateLimiterLayer> {
    if !config.enabled {
        return None;
    }

    let Some(governor) = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(config.per_second)
        .burst_size(config.burst)
        .finish()
    else {
        tracing::error!(
            per_second = config.per_second,
            burst = config.burst,
            "Invalid rate limit configuration, rate limiting disabled"
        );
        return None;
    };

    tracing::info!(
        per_second = config.per_second,
        burst = config.burst,
        "Rate limiting enabled"
    );
    Some(GovernorLayer::new(Arc::new(governor)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap_or_default()
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let req = request(&[
            ("x-forwarded-for", "10.0.0.1"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        assert_eq!(client_ip(&req), "203.0.113.7".parse().ok());
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let req = request(&[("x-forwarded-for", "198.51.100.2, 10.0.0.1")]);
        assert_eq!(client_ip(&req), "198.51.100.2".parse().ok());
    }

    #[test]
    fn test_fly_header_and_peer_fallback() {
        let req = request(&[("fly-client-ip", "2001:db8::1")]);
        assert_eq!(client_ip(&req), "2001:db8::1".parse().ok());

        let mut req = request(&[("x-real-ip", "not-an-ip")]);
        assert_eq!(client_ip(&req), None);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 4000))));
        assert_eq!(client_ip(&req), "192.0.2.9".parse().ok());
    }

    #[test]
    fn test_disabled_limiter() {
        assert!(rate_limiter(&RateLimitConfig::default()).is_none());
        let enabled = RateLimitConfig {
            enabled: true,
            ..RateLimitConfig::default()
        };
        assert!(rate_limiter(&enabled).is_some());
    }

    #[test]
    fn test_zero_burst_disables() {
        let invalid = RateLimitConfig {
            enabled: true,
            per_second: 1,
            burst: 0,
        };
        assert!(rate_limiter(&invalid).is_none());
    }
}
