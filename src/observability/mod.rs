pub mod metrics;
pub mod tracing;
pub mod logging;
pub mod health;

#[cfg(test)]
mod tests;

pub use metrics::{Metrics, MetricsRegistry, Timer};
pub use tracing::init_tracing;
pub use logging::{sanitize_query, LoggingService};
pub use health::{health_routes, ComponentHealth, HealthService, HealthStatus};

use std::sync::Arc;

use crate::catalog::ProductCache;
use crate::config::Config;
use crate::error::CatalogResult;

/// Metrics, structured logging and health checks bundled for the server
#[derive(Clone)]
pub struct ObservabilityService {
    pub metrics: MetricsRegistry,
    pub logging: LoggingService,
    pub health: HealthService,
}

impl ObservabilityService {
    pub fn new(config: &Config, cache: Arc<ProductCache>) -> CatalogResult<Self> {
        Ok(Self {
            metrics: MetricsRegistry::new()?,
            logging: LoggingService::new(),
            health: HealthService::new(config, cache),
        })
    }
}
