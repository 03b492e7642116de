//! Bearer-token auth and per-client rate limiting for mutating routes.

use super::{AppState, error_response};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use subtle::ConstantTimeEq;

/// Extract the bearer token, if any.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Constant-time API key comparison. Length differences short-circuit, but
/// the contents never do.
fn key_matches(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    if expected.len() != provided.len() {
        return false;
    }
    bool::from(expected.ct_eq(provided))
}

/// The key the rate limiter buckets a client under.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

/// Gate a mutating request: rate limit first, then the API key when one is
/// configured.
pub(crate) fn guard_mutation(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let key = client_key(headers);
    if state.inner.limiter.check_key(&key).is_err() {
        return Err(error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded",
        ));
    }

    if let Some(expected) = &state.inner.api_key {
        let authorized = bearer_token(headers).is_some_and(|t| key_matches(expected, t));
        if !authorized {
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid API key",
            ));
        }
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
