//! Shared-secret check for provider callbacks.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use common::AppError;

use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub async fn webhook_secret_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !secret_matches(request.headers(), &state.config.webhook_secret) {
        tracing::warn!(path = %request.uri().path(), "Webhook call with a bad secret");
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}

fn secret_matches(headers: &HeaderMap, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    headers
        .get(WEBHOOK_SECRET_HEADER)
        .map(|given| given.as_bytes().ct_eq(expected.as_bytes()).into())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn empty_expected_secret_never_matches() {
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_SECRET_HEADER, HeaderValue::from_static(""));
        assert!(!secret_matches(&headers, ""));
    }

    #[test]
    fn matching_secret() {
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_SECRET_HEADER, HeaderValue::from_static("s3cret"));
        assert!(secret_matches(&headers, "s3cret"));
        assert!(!secret_matches(&headers, "s3cre"));
    }
}
