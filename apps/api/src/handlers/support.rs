//! Helpers shared across handler modules.

use axum::http::HeaderMap;

use crate::middleware::client_ip;

/// Client IP as a string for rate-limit keys, falling back to `"unknown"`.
pub fn client_ip_string(headers: &HeaderMap) -> String {
    client_ip(headers).map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_owned())
}
