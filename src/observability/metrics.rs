use prometheus::core::Collector;
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use crate::error::{CatalogError, CatalogResult};

/// Prometheus metrics registry and collectors
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

/// All application metrics
pub struct Metrics {
    // Search metrics
    pub search_total: Counter,
    pub search_errors_total: Counter,
    pub search_duration_seconds: Histogram,

    // Cache metrics
    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,

    // Upstream metrics
    pub upstream_requests_total: Counter,
    pub upstream_errors_total: Counter,
    pub upstream_records_fetched: Histogram,
    pub inflight_drains: Gauge,

    // Local mirror metrics
    pub malformed_shards_total: Counter,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all collectors
    pub fn new() -> CatalogResult<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);

        Ok(Self { registry, metrics })
    }

    /// Get metrics in Prometheus text format
    pub fn gather(&self) -> CatalogResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| CatalogError::Internal(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer)
            .map_err(|e| CatalogError::Internal(format!("Failed to convert metrics to string: {}", e)))
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> CatalogResult<Counter> {
    let counter = Counter::new(name, help)
        .map_err(|e| CatalogError::Internal(format!("Failed to create {} metric: {}", name, e)))?;
    register(registry, name, counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> CatalogResult<Gauge> {
    let gauge = Gauge::new(name, help)
        .map_err(|e| CatalogError::Internal(format!("Failed to create {} metric: {}", name, e)))?;
    register(registry, name, gauge)
}

fn histogram(registry: &Registry, name: &str, help: &str, buckets: Vec<f64>) -> CatalogResult<Histogram> {
    let histogram = Histogram::with_opts(HistogramOpts::new(name, help).buckets(buckets))
        .map_err(|e| CatalogError::Internal(format!("Failed to create {} metric: {}", name, e)))?;
    register(registry, name, histogram)
}

fn register<C>(registry: &Registry, name: &str, collector: C) -> CatalogResult<C>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|e| CatalogError::Internal(format!("Failed to register {}: {}", name, e)))?;
    Ok(collector)
}

impl Metrics {
    fn new(registry: &Registry) -> CatalogResult<Self> {
        Ok(Self {
            search_total: counter(registry, "search_total", "Total number of local search requests processed")?,
            search_errors_total: counter(registry, "search_errors_total", "Total number of local search errors")?,
            search_duration_seconds: histogram(
                registry,
                "search_duration_seconds",
                "Duration of local search requests in seconds",
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )?,
            cache_hits_total: counter(registry, "cache_hits_total", "Total number of aggregation cache hits")?,
            cache_misses_total: counter(registry, "cache_misses_total", "Total number of aggregation cache misses")?,
            upstream_requests_total: counter(
                registry,
                "upstream_requests_total",
                "Total number of page requests sent to the store API",
            )?,
            upstream_errors_total: counter(
                registry,
                "upstream_errors_total",
                "Total number of failed store API aggregations",
            )?,
            upstream_records_fetched: histogram(
                registry,
                "upstream_records_fetched",
                "Number of records returned by one store API aggregation",
                vec![1.0, 10.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2500.0, 5000.0],
            )?,
            inflight_drains: gauge(registry, "inflight_drains", "Number of store API aggregations in progress")?,
            malformed_shards_total: counter(
                registry,
                "malformed_shards_total",
                "Total number of mirror shards skipped because they could not be parsed",
            )?,
        })
    }
}

/// Timer helper for measuring durations
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    pub fn new(histogram: Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    pub fn observe(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry_creation() {
        let registry = MetricsRegistry::new().unwrap();
        assert!(registry.gather().is_ok());
    }

    #[test]
    fn test_metrics_collection() {
        let registry = MetricsRegistry::new().unwrap();

        registry.metrics.search_total.inc();
        registry.metrics.cache_hits_total.inc();
        registry.metrics.inflight_drains.set(1.0);
        registry.metrics.upstream_records_fetched.observe(800.0);

        let output = registry.gather().unwrap();
        assert!(output.contains("search_total 1"));
        assert!(output.contains("cache_hits_total 1"));
        assert!(output.contains("inflight_drains 1"));
        assert!(output.contains("upstream_records_fetched_count 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = MetricsRegistry::new().unwrap();
        let b = MetricsRegistry::new().unwrap();
        a.metrics.malformed_shards_total.inc();

        assert!(a.gather().unwrap().contains("malformed_shards_total 1"));
        assert!(b.gather().unwrap().contains("malformed_shards_total 0"));
    }

    #[test]
    fn test_timer_functionality() {
        let registry = MetricsRegistry::new().unwrap();
        let timer = Timer::new(registry.metrics.search_duration_seconds.clone());
        std::thread::sleep(std::time::Duration::from_millis(1));
        timer.observe();

        let output = registry.gather().unwrap();
        assert!(output.contains("search_duration_seconds_count 1"));
    }
}
