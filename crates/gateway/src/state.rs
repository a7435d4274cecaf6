//! Application state for dependency injection.

use std::sync::Arc;

use lead_service_lib::infra::Database;
use lead_service_lib::service::Services;

use crate::config::GatewayConfig;
use crate::middleware::Cache;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// `None` runs without rate limiting or lookup caching
    pub cache: Option<Arc<Cache>>,
    /// `None` in memory mode
    pub database: Option<Database>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Create new app state.
    pub fn new(
        services: Services,
        cache: Option<Arc<Cache>>,
        database: Option<Database>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            services,
            cache,
            database,
            config: Arc::new(config),
        }
    }
}
