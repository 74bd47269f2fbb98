use super::*;
use crate::cache::TtlCache;
use crate::error::CatalogError;
use axum::http::StatusCode;
use axum_test::TestServer;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

fn create_test_cache() -> Arc<ProductCache> {
    Arc::new(TtlCache::new(Duration::from_secs(600), 4))
}

fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.upstream.store_id = Some("12345".to_string());
    config.upstream.access_token = Some("token".to_string());
    config.local.data_dir = dir.path().to_path_buf();
    config
}

#[tokio::test]
async fn test_observability_service_initialization() {
    let dir = TempDir::new().unwrap();
    let observability = ObservabilityService::new(&create_test_config(&dir), create_test_cache());
    assert!(observability.is_ok());

    let obs = observability.unwrap();
    assert!(obs.metrics.gather().is_ok());
}

#[tokio::test]
async fn test_metrics_collection_integration() {
    let registry = MetricsRegistry::new().unwrap();

    registry.metrics.search_total.inc();
    registry.metrics.search_duration_seconds.observe(0.045);
    registry.metrics.upstream_requests_total.inc_by(5.0);
    registry.metrics.upstream_records_fetched.observe(800.0);
    registry.metrics.malformed_shards_total.inc();

    let output = registry.gather().unwrap();

    for name in [
        "search_total",
        "search_errors_total",
        "search_duration_seconds",
        "cache_hits_total",
        "cache_misses_total",
        "upstream_requests_total",
        "upstream_errors_total",
        "upstream_records_fetched",
        "malformed_shards_total",
        "inflight_drains",
    ] {
        assert!(output.contains(name), "missing metric {}", name);
    }
    assert!(output.contains("upstream_requests_total 5"));
}

#[tokio::test]
async fn test_structured_logging_integration() {
    let logger = LoggingService::new();

    logger.log_search_request("zapatillas nike talle 42", 1, 50, "keywords");
    logger.log_search_response(12.0, 1, 1, 3);

    let mut context = HashMap::new();
    context.insert("resource".to_string(), serde_json::json!("products"));
    context.insert("page".to_string(), serde_json::json!(3));

    let error = CatalogError::Upstream {
        status: 401,
        body: "Invalid access token".to_string(),
    };
    logger.log_error(&error, Some(context));

    logger.log_cache_operation("get", "products:page=2:per_page=50", false);
    logger.log_upstream_drain("categories", 12, 1, 80.0, true);
}

#[tokio::test]
async fn test_health_check_endpoints() {
    let dir = TempDir::new().unwrap();
    let health_service = HealthService::new(&create_test_config(&dir), create_test_cache());
    let app = health_routes().with_state(health_service);
    let server = TestServer::new(app).unwrap();

    let response = server.get("/health/live").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "alive");
    assert!(json["timestamp"].is_string());

    let response = server.get("/health/ready").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let health: health::HealthResponse = response.json();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let detailed: health::HealthResponse = response.json();
    assert!(detailed.components.contains_key("upstream"));
    assert!(detailed.components.contains_key("local_mirror"));
    assert!(detailed.components.contains_key("cache"));
}

#[tokio::test]
async fn test_readiness_fails_when_local_mirror_missing() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.server.mode = crate::config::CatalogMode::LocalMirror;
    config.local.data_dir = dir.path().join("absent");

    let app = health_routes().with_state(HealthService::new(&config, create_test_cache()));
    let server = TestServer::new(app).unwrap();

    let response = server.get("/health/ready").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    // Liveness does not depend on components
    let response = server.get("/health/live").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_cache_occupancy() {
    let dir = TempDir::new().unwrap();
    let cache = create_test_cache();
    cache.insert("all_products", Arc::new(Vec::new()));

    let service = HealthService::new(&create_test_config(&dir), cache);
    let health = service.comprehensive_health_check().await;

    let cache_health = health.components.get("cache").unwrap();
    assert_eq!(cache_health.status, HealthStatus::Healthy);
    assert!(cache_health.message.as_deref().unwrap().starts_with("1 of 4 entries"));
}

#[tokio::test]
async fn test_timer_functionality() {
    let registry = MetricsRegistry::new().unwrap();
    let timer = Timer::new(registry.metrics.search_duration_seconds.clone());

    sleep(Duration::from_millis(10)).await;
    timer.observe();

    let output = registry.gather().unwrap();
    assert!(output.contains("search_duration_seconds_bucket"));
}

#[test]
fn test_error_type_classification() {
    let errors = vec![
        CatalogError::InvalidRequest("Bad query".to_string()),
        CatalogError::NotFound("data".to_string()),
        CatalogError::Upstream { status: 500, body: String::new() },
        CatalogError::UpstreamPayload("not a list".to_string()),
        CatalogError::Config("bad".to_string()),
        CatalogError::Internal("Internal error".to_string()),
    ];

    let expected_types = vec![
        "invalid_request",
        "not_found",
        "upstream_error",
        "upstream_payload_error",
        "config_error",
        "internal_error",
    ];

    for (error, expected_type) in errors.iter().zip(expected_types.iter()) {
        assert_eq!(error.error_type(), *expected_type);
    }
}
