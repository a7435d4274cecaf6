//! Middleware for authentication, webhook verification, rate limiting, and caching.

mod auth;
mod cache;
mod rate_limit;
mod webhook;

pub use auth::{
    auth_middleware, issue_token, verify_token, StaffClaims, CORRELATION_HEADER,
};
pub use cache::Cache;
pub use rate_limit::{rate_limit_middleware, rate_limit_public_middleware};
pub use webhook::{webhook_secret_middleware, WEBHOOK_SECRET_HEADER};
