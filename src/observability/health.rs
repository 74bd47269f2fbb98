use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::ProductCache;
use crate::config::{CatalogMode, Config};

/// Probes the pieces the connector depends on
#[derive(Clone)]
pub struct HealthService {
    started_at: Instant,
    token_configured: bool,
    store_configured: bool,
    mode: CatalogMode,
    data_dir: PathBuf,
    cache: Arc<ProductCache>,
}

/// Result of probing one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub latency_ms: f64,
}

/// Ordered from best to worst, so the overall status is the maximum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Body of `/health` and `/health/ready`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checked_at: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub mode: String,
    pub uptime_seconds: u64,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Outcome of a single component probe
pub type Probe = (HealthStatus, Option<String>);

impl HealthService {
    pub fn new(config: &Config, cache: Arc<ProductCache>) -> Self {
        Self {
            started_at: Instant::now(),
            token_configured: config.upstream.access_token.is_some(),
            store_configured: config.upstream.store_id.is_some(),
            mode: config.server.mode,
            data_dir: config.local.data_dir.clone(),
            cache,
        }
    }

    /// Credentials are only verified by the store itself, so a missing one
    /// degrades rather than fails the service
    pub fn check_upstream(&self) -> Probe {
        match (self.store_configured, self.token_configured) {
            (true, true) => (HealthStatus::Healthy, None),
            (false, _) => (HealthStatus::Degraded, Some("TIENDANUBE_STORE_ID is not set".to_string())),
            (_, false) => (HealthStatus::Degraded, Some("TIENDANUBE_ACCESS_TOKEN is not set".to_string())),
        }
    }

    /// The mirror is only required when it backs the product listing
    pub async fn check_local_mirror(&self) -> Probe {
        let dir = self.data_dir.clone();
        let exists = tokio::task::spawn_blocking(move || dir.is_dir())
            .await
            .unwrap_or(false);

        if exists {
            return (HealthStatus::Healthy, None);
        }

        let message = Some(format!("Data directory does not exist: {}", self.data_dir.display()));
        match self.mode {
            CatalogMode::LocalMirror => (HealthStatus::Unhealthy, message),
            CatalogMode::Upstream => (HealthStatus::Degraded, message),
        }
    }

    pub fn check_cache(&self) -> Probe {
        let stats = self.cache.stats();
        (
            HealthStatus::Healthy,
            Some(format!(
                "{} of {} entries, hit ratio {:.2}",
                self.cache.len(),
                self.cache.max_entries(),
                stats.hit_ratio()
            )),
        )
    }

    /// Run every probe and fold them into one report
    pub async fn comprehensive_health_check(&self) -> HealthResponse {
        let mut components = BTreeMap::new();

        let start = Instant::now();
        components.insert("upstream".to_string(), component(self.check_upstream(), start));

        let start = Instant::now();
        components.insert("local_mirror".to_string(), component(self.check_local_mirror().await, start));

        let start = Instant::now();
        components.insert("cache".to_string(), component(self.check_cache(), start));

        HealthResponse {
            status: overall_status(&components),
            checked_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: format!("{:?}", self.mode),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            components,
        }
    }
}

fn component((status, message): Probe, start: Instant) -> ComponentHealth {
    ComponentHealth {
        status,
        message,
        latency_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}

/// Worst component status wins
fn overall_status(components: &BTreeMap<String, ComponentHealth>) -> HealthStatus {
    components
        .values()
        .map(|health| health.status)
        .max()
        .unwrap_or(HealthStatus::Healthy)
}

/// Liveness probe handler - basic check that service is running
pub async fn liveness_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness probe handler - degraded still serves traffic
pub async fn readiness_handler(
    State(health_service): State<HealthService>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let health = health_service.comprehensive_health_check().await;

    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => Ok(Json(health)),
        HealthStatus::Unhealthy => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

/// Detailed health handler for monitoring/debugging
pub async fn health_handler(State(health_service): State<HealthService>) -> Json<HealthResponse> {
    Json(health_service.comprehensive_health_check().await)
}

/// Create health check routes
pub fn health_routes() -> Router<HealthService> {
    Router::new()
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/health", get(health_handler))
}
