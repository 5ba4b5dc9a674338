//! Shared helpers for request authentication.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Admin secret from `X-API-Key`, falling back to a Bearer token.
pub fn extract_admin_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .or_else(|| extract_bearer_token(headers))
}

/// Compare two secrets without leaking where they differ.
///
/// Length is compared first; it isn't secret.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}
