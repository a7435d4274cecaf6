//! Gateway configuration.

use std::env;

use common::{env_or, AppError, AppResult, CacheConfig, JwtConfig, RateLimitConfig};

const MIN_JWT_SECRET_LEN: usize = 32;

/// Gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Redis for rate limiting and lookups caching
    pub cache: CacheConfig,
    pub jwt: JwtConfig,
    /// Authenticated staff routes
    pub rate_limit: RateLimitConfig,
    /// Public funnel routes, per client IP
    pub public_rate_limit: RateLimitConfig,
    /// Shared secret expected in `X-Webhook-Secret`
    pub webhook_secret: String,
    /// Empty means any origin
    pub cors_allowed_origins: Vec<String>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cache", &self.cache)
            .field("jwt", &self.jwt)
            .field("rate_limit", &self.rate_limit)
            .field("public_rate_limit", &self.public_rate_limit)
            .field("webhook_secret", &"[REDACTED]")
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("GATEWAY_HOST").unwrap_or(defaults.host),
            port: env_or("GATEWAY_PORT", defaults.port),
            cache: CacheConfig {
                url: env::var("GATEWAY_REDIS_URL")
                    .or_else(|_| env::var("REDIS_URL"))
                    .unwrap_or(defaults.cache.url),
                default_ttl_seconds: env_or("CACHE_TTL_SECONDS", defaults.cache.default_ttl_seconds),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt.secret),
                leeway_seconds: env_or("JWT_LEEWAY_SECONDS", defaults.jwt.leeway_seconds),
            },
            rate_limit: RateLimitConfig {
                max_requests: env_or("RATE_LIMIT_REQUESTS", defaults.rate_limit.max_requests),
                window_seconds: env_or(
                    "RATE_LIMIT_WINDOW_SECONDS",
                    defaults.rate_limit.window_seconds,
                ),
            },
            public_rate_limit: RateLimitConfig {
                max_requests: env_or(
                    "RATE_LIMIT_PUBLIC_REQUESTS",
                    defaults.public_rate_limit.max_requests,
                ),
                window_seconds: env_or(
                    "RATE_LIMIT_PUBLIC_WINDOW_SECONDS",
                    defaults.public_rate_limit.window_seconds,
                ),
            },
            webhook_secret: env::var("WEBHOOK_SECRET").unwrap_or(defaults.webhook_secret),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Refuse to start with secrets a release build should never run with.
    pub fn check(&self) -> AppResult<()> {
        if self.webhook_secret.is_empty() {
            return Err(AppError::internal("WEBHOOK_SECRET is not set"));
        }
        if self.jwt.secret.len() < MIN_JWT_SECRET_LEN {
            if cfg!(debug_assertions) {
                tracing::warn!(
                    "JWT_SECRET is shorter than {} characters; acceptable for development only",
                    MIN_JWT_SECRET_LEN
                );
            } else {
                return Err(AppError::internal(format!(
                    "JWT_SECRET must be at least {} characters",
                    MIN_JWT_SECRET_LEN
                )));
            }
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cache: CacheConfig::default(),
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
            public_rate_limit: RateLimitConfig {
                max_requests: 30,
                window_seconds: 60,
            },
            webhook_secret: String::new(),
            cors_allowed_origins: Vec::new(),
        }
    }
}
