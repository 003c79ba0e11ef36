//! Uniform cross-origin headers.
//!
//! Every response leaving the dispatcher carries the same five headers,
//! including 404s and preflight answers. The private-network pair lets a page
//! on a public origin reach this loopback listener.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

pub const ACCESS_CONTROL_ALLOW_PRIVATE_NETWORK: HeaderName =
    HeaderName::from_static("access-control-allow-private-network");

/// Request header browsers send on private-network preflights.
pub const ACCESS_CONTROL_REQUEST_PRIVATE_NETWORK: &str = "Access-Control-Request-Private-Network";

pub fn cors_headers() -> [(HeaderName, HeaderValue); 5] {
    [
        (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        (
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ),
        (
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Access-Control-Request-Private-Network"),
        ),
        (ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400")),
        (
            ACCESS_CONTROL_ALLOW_PRIVATE_NETWORK,
            HeaderValue::from_static("true"),
        ),
    ]
}

/// Wrap every route (and the fallback) so responses carry the CORS headers.
/// Values set by a handler are overridden.
pub fn with_cors(router: Router) -> Router {
    cors_headers()
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(name, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_headers_names_private_network_preflight() {
        let headers = cors_headers();
        let allow = headers
            .iter()
            .find(|(name, _)| *name == ACCESS_CONTROL_ALLOW_HEADERS)
            .map(|(_, value)| value.to_str().unwrap())
            .unwrap();
        assert!(allow.contains(ACCESS_CONTROL_REQUEST_PRIVATE_NETWORK));
        assert!(allow.contains("Content-Type"));
    }
}
