//! Lead service configuration.

use std::env;
use std::time::Duration;

use common::{env_flag, env_or, DatabaseConfig};

/// Lead service configuration.
#[derive(Clone)]
pub struct LeadServiceConfig {
    /// Database connection settings
    pub database: DatabaseConfig,
    /// Redis URL for caching
    pub redis_url: String,
    /// Public origin used to build payment links
    pub public_base_url: String,
    /// Hosted checkout page of the payment provider
    pub payment_checkout_url: String,
    /// HS256 secret for signed payment links
    pub payment_link_secret: String,
    /// Fee charged on submission, in cents
    pub default_fee_cents: i64,
    /// Postal code lookup service
    pub geo_api_url: String,
    pub geo_timeout: Duration,
    /// Team mailbox for notifications
    pub notify_team_email: Option<String>,
    /// Optional webhook receiving notification payloads
    pub notify_webhook_url: Option<String>,
    /// Whether operators see provider delivery diagnostics on emails
    pub operator_sees_delivery_diagnostics: bool,
    /// Bounded wait for optimistic write confirmation
    pub realtime_confirm_timeout: Duration,
    /// Buffered change events per subscriber before it lags
    pub realtime_channel_capacity: usize,
    /// Upper bound on a single notification dispatch
    pub notify_timeout: Duration,
}

impl std::fmt::Debug for LeadServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeadServiceConfig")
            .field("database", &self.database)
            .field("public_base_url", &self.public_base_url)
            .field("payment_checkout_url", &self.payment_checkout_url)
            .field("payment_link_secret", &"[REDACTED]")
            .field("default_fee_cents", &self.default_fee_cents)
            .field("geo_api_url", &self.geo_api_url)
            .field("notify_team_email", &self.notify_team_email)
            .field("notify_webhook_url", &self.notify_webhook_url)
            .field(
                "operator_sees_delivery_diagnostics",
                &self.operator_sees_delivery_diagnostics,
            )
            .field("realtime_confirm_timeout", &self.realtime_confirm_timeout)
            .field("realtime_channel_capacity", &self.realtime_channel_capacity)
            .finish()
    }
}

impl LeadServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database: DatabaseConfig::from_env(),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            payment_checkout_url: env::var("PAYMENT_CHECKOUT_URL")
                .unwrap_or(defaults.payment_checkout_url),
            payment_link_secret: env::var("PAYMENT_LINK_SECRET")
                .unwrap_or(defaults.payment_link_secret),
            default_fee_cents: env_or("DEFAULT_FEE_CENTS", defaults.default_fee_cents),
            geo_api_url: env::var("GEO_API_URL").unwrap_or(defaults.geo_api_url),
            geo_timeout: Duration::from_millis(env_or("GEO_TIMEOUT_MS", 2_000)),
            notify_team_email: env::var("NOTIFY_TEAM_EMAIL").ok().filter(|v| !v.is_empty()),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok().filter(|v| !v.is_empty()),
            operator_sees_delivery_diagnostics: env_flag(
                "OPERATOR_SEES_DELIVERY_DIAGNOSTICS",
                false,
            ),
            realtime_confirm_timeout: Duration::from_millis(env_or(
                "REALTIME_CONFIRM_TIMEOUT_MS",
                5_000,
            )),
            realtime_channel_capacity: env_or(
                "REALTIME_CHANNEL_CAPACITY",
                defaults.realtime_channel_capacity,
            ),
            notify_timeout: Duration::from_millis(env_or("NOTIFY_TIMEOUT_MS", 3_000)),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for LeadServiceConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            payment_checkout_url: "https://checkout.example.com/pay".to_string(),
            payment_link_secret: "dev-payment-link-secret-change-me-please".to_string(),
            default_fee_cents: 12_900,
            geo_api_url: "https://geo.api.gouv.fr".to_string(),
            geo_timeout: Duration::from_secs(2),
            notify_team_email: None,
            notify_webhook_url: None,
            operator_sees_delivery_diagnostics: false,
            realtime_confirm_timeout: Duration::from_secs(5),
            realtime_channel_capacity: 256,
            notify_timeout: Duration::from_secs(3),
        }
    }
}
