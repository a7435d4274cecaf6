//! Authentication middleware.
//!
//! Bearer JWTs are verified locally; the `sub` claim is the staff email and
//! must resolve to an active account. The resulting [`StaffContext`] is
//! placed in the request extensions for handlers.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{AppError, AppResult, JwtConfig};

use crate::state::AppState;

/// Header carrying the client's id for an optimistic write.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Staff token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffClaims {
    /// Staff email
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign a staff token. Used by the `token` CLI command and tests.
pub fn issue_token(config: &JwtConfig, email: &str, ttl_seconds: i64) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let claims = StaffClaims {
        sub: email.to_string(),
        iat: now,
        exp: now + ttl_seconds,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?)
}

/// Verify signature and expiry.
pub fn verify_token(config: &JwtConfig, token: &str) -> AppResult<StaffClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = config.leeway_seconds;
    let data = decode::<StaffClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Authentication middleware that validates JWT tokens.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers())?;
    let claims = verify_token(&state.config.jwt, token)?;

    let correlation = correlation_id(request.headers())?;

    let ctx = state
        .services
        .staff()
        .authenticate(&claims.sub)
        .await?
        .with_correlation(correlation);

    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    // Echo so the client can match the reply to its optimistic write
    if let Some(value) = correlation.and_then(|id| HeaderValue::from_str(&id.to_string()).ok()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    Ok(response)
}

/// Extract bearer token from Authorization header.
fn extract_token(headers: &HeaderMap) -> AppResult<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)
}

fn correlation_id(headers: &HeaderMap) -> AppResult<Option<Uuid>> {
    let Some(value) = headers.get(CORRELATION_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or_else(|| AppError::invalid_field("x-correlation-id", "Correlation id must be a UUID"))
}
