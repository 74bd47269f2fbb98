use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::normalize::{normalize_category, normalize_product};
use crate::cache::{product_page_key, SingleFlight, TtlCache, ALL_PRODUCTS_KEY};
use crate::config::{CatalogMode, Config};
use crate::error::{CatalogError, CatalogResult};
use crate::observability::{LoggingService, MetricsRegistry, Timer};
use crate::search::{paginate, KeywordMatcher, Matcher};
use crate::shards::{read_metadata, ShardReader};
use crate::types::{
    AllProductsResponse, CategoriesResponse, Product, ProductsRequest, SearchPage, SearchRequest,
    ShardMetadata,
};
use crate::upstream::{drain, PageFetcher, CATEGORIES, PRODUCTS};

/// Aggregation cache holding normalized product lists
pub type ProductCache = TtlCache<Arc<Vec<Product>>>;

type ProductList = Arc<Vec<Product>>;

/// Result of scanning the local mirror for matches
struct ScanOutcome {
    matches: Vec<Product>,
    shards: usize,
    skipped_shards: usize,
}

/// Answers catalog queries from the store API or the local mirror
pub struct CatalogService {
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<ProductCache>,
    flights: SingleFlight<ProductList>,
    mode: CatalogMode,
    per_page: usize,
    max_records: usize,
    data_dir: PathBuf,
    search_file: Option<PathBuf>,
    max_matches: usize,
    metrics: MetricsRegistry,
    logging: LoggingService,
}

impl CatalogService {
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        cache: Arc<ProductCache>,
        metrics: MetricsRegistry,
        logging: LoggingService,
    ) -> Self {
        Self {
            fetcher,
            cache,
            flights: SingleFlight::new(),
            mode: config.server.mode,
            per_page: config.upstream.per_page,
            max_records: config.upstream.max_records,
            data_dir: config.local.data_dir.clone(),
            search_file: config.local.search_file.clone(),
            max_matches: config.local.max_matches,
            metrics,
            logging,
        }
    }

    pub fn cache(&self) -> &Arc<ProductCache> {
        &self.cache
    }

    pub fn mode(&self) -> CatalogMode {
        self.mode
    }

    /// All products, or one upstream page of them, served from the cache
    /// within its TTL.
    ///
    /// Concurrent misses for the same key share a single aggregation. The
    /// optional filter runs on the normalized list after the cache lookup.
    #[instrument(skip(self), fields(page = ?request.page, per_page = ?request.per_page))]
    pub async fn all_products(&self, request: ProductsRequest) -> CatalogResult<AllProductsResponse> {
        let per_page = request.per_page.unwrap_or(self.per_page);
        let page = match self.mode {
            CatalogMode::Upstream => request.page,
            CatalogMode::LocalMirror => None,
        };
        let key = match page {
            Some(page) => product_page_key(page, per_page),
            None => ALL_PRODUCTS_KEY.to_string(),
        };

        let cached = if request.use_cache {
            let hit = self.cache.get(&key);
            self.logging.log_cache_operation("get", &key, hit.is_some());
            match &hit {
                Some(_) => self.metrics.metrics.cache_hits_total.inc(),
                None => self.metrics.metrics.cache_misses_total.inc(),
            }
            hit
        } else {
            debug!("Cache bypassed for {}", key);
            None
        };

        let (was_cached, products) = match cached {
            Some(products) => (true, products),
            None => (false, self.refresh(&key, page, per_page).await?),
        };

        let mut products: Vec<Product> = products.as_ref().clone();

        if self.mode == CatalogMode::LocalMirror {
            if let Some(page) = request.page {
                products = paginate(products, page, per_page).items;
            }
        }

        if let Some(filter) = &request.filter {
            let matcher = KeywordMatcher::new(filter);
            products.retain(|product| matcher.matches(product));
            debug!("Filter '{}' kept {} products", filter, products.len());
        }

        Ok(AllProductsResponse {
            cached: was_cached,
            page: request.page,
            per_page: request.page.map(|_| per_page),
            count: products.len(),
            products,
        })
    }

    /// Materialize the product list for `key` and store it, coalescing with
    /// any aggregation already running for the same key
    async fn refresh(&self, key: &str, page: Option<usize>, per_page: usize) -> CatalogResult<ProductList> {
        let cache = Arc::clone(&self.cache);
        let owned_key = key.to_string();
        let metrics = self.metrics.clone();

        let load = match self.mode {
            CatalogMode::Upstream => ProductSource::Upstream {
                fetcher: Arc::clone(&self.fetcher),
                page,
                per_page,
                max_records: self.max_records,
                logging: self.logging.clone(),
            },
            CatalogMode::LocalMirror => ProductSource::LocalMirror {
                reader: ShardReader::new(self.data_dir.clone()),
            },
        };

        self.flights
            .run(key, move || async move {
                let products = Arc::new(load.products(&metrics).await?);
                cache.insert(owned_key, Arc::clone(&products));
                Ok(products)
            })
            .await
    }

    /// Every category of the store, always drained live
    #[instrument(skip(self))]
    pub async fn categories(&self) -> CatalogResult<CategoriesResponse> {
        let records = drain_upstream(
            self.fetcher.as_ref(),
            CATEGORIES,
            self.per_page,
            self.max_records,
            &self.metrics,
            &self.logging,
        )
        .await?;

        let categories: Vec<_> = records.iter().filter_map(normalize_category).collect();
        if categories.len() < records.len() {
            warn!("Skipped {} category records that were not objects", records.len() - categories.len());
        }

        Ok(CategoriesResponse {
            count: categories.len(),
            categories,
        })
    }

    /// Keyword search over the local mirror, or over the configured flat file
    #[instrument(skip(self), fields(page = request.page, per_page = request.per_page, mode = ?request.mode))]
    pub async fn search(&self, request: SearchRequest) -> CatalogResult<SearchPage> {
        let timer = Timer::new(self.metrics.metrics.search_duration_seconds.clone());
        let started = Instant::now();
        self.metrics.metrics.search_total.inc();
        self.logging.log_search_request(
            &request.query,
            request.page,
            request.per_page,
            request.mode.as_str(),
        );

        let reader = match &self.search_file {
            Some(path) => ShardReader::flat_file(path),
            None => ShardReader::new(self.data_dir.clone()),
        };
        let matcher = Matcher::for_mode(request.mode, &request.query);
        let max_matches = self.max_matches;

        let outcome = tokio::task::spawn_blocking(move || scan(&reader, &matcher, max_matches))
            .await
            .map_err(|e| CatalogError::Internal(format!("Search task failed: {}", e)))
            .and_then(|outcome| outcome);

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.metrics.metrics.search_errors_total.inc();
                self.logging.log_error(&e, None);
                return Err(e);
            }
        };

        if outcome.skipped_shards > 0 {
            self.metrics
                .metrics
                .malformed_shards_total
                .inc_by(outcome.skipped_shards as f64);
        }

        let page = paginate(outcome.matches, request.page, request.per_page);
        timer.observe();
        self.logging.log_search_response(
            started.elapsed().as_secs_f64() * 1000.0,
            page.items.len(),
            page.total,
            outcome.shards,
        );

        Ok(SearchPage {
            query: request.query,
            page: request.page,
            per_page: request.per_page,
            results_count: page.items.len(),
            total_found: page.total,
            has_more: page.has_more,
            products: page.items,
        })
    }

    /// Sidecar metadata of the local mirror
    pub async fn metadata(&self) -> CatalogResult<ShardMetadata> {
        let dir = self.data_dir.clone();
        tokio::task::spawn_blocking(move || read_metadata(&dir))
            .await
            .map_err(|e| CatalogError::Internal(format!("Metadata task failed: {}", e)))?
    }
}

/// Where a product aggregation reads from
enum ProductSource {
    Upstream {
        fetcher: Arc<dyn PageFetcher>,
        page: Option<usize>,
        per_page: usize,
        max_records: usize,
        logging: LoggingService,
    },
    LocalMirror {
        reader: ShardReader,
    },
}

impl ProductSource {
    async fn products(self, metrics: &MetricsRegistry) -> CatalogResult<Vec<Product>> {
        match self {
            ProductSource::Upstream {
                fetcher,
                page,
                per_page,
                max_records,
                logging,
            } => {
                let records = match page {
                    Some(page) => fetch_upstream_page(fetcher.as_ref(), page, per_page, metrics).await?,
                    None => {
                        drain_upstream(fetcher.as_ref(), PRODUCTS, per_page, max_records, metrics, &logging)
                            .await?
                    }
                };
                Ok(normalize_products(records))
            }
            ProductSource::LocalMirror { reader } => {
                let (products, skipped) = tokio::task::spawn_blocking(move || load_mirror(&reader))
                    .await
                    .map_err(|e| CatalogError::Internal(format!("Mirror task failed: {}", e)))??;
                if skipped > 0 {
                    metrics.metrics.malformed_shards_total.inc_by(skipped as f64);
                }
                Ok(products)
            }
        }
    }
}

async fn fetch_upstream_page(
    fetcher: &dyn PageFetcher,
    page: usize,
    per_page: usize,
    metrics: &MetricsRegistry,
) -> CatalogResult<Vec<Value>> {
    metrics.metrics.upstream_requests_total.inc();
    let records = fetcher.fetch_page(PRODUCTS, page, per_page).await.map_err(|e| {
        metrics.metrics.upstream_errors_total.inc();
        e
    })?;
    metrics.metrics.upstream_records_fetched.observe(records.len() as f64);
    Ok(records)
}

async fn drain_upstream(
    fetcher: &dyn PageFetcher,
    resource: &str,
    per_page: usize,
    max_records: usize,
    metrics: &MetricsRegistry,
    logging: &LoggingService,
) -> CatalogResult<Vec<Value>> {
    let started = Instant::now();
    metrics.metrics.inflight_drains.inc();
    let result = drain(fetcher, resource, per_page, max_records).await;
    metrics.metrics.inflight_drains.dec();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(drained) => {
            metrics.metrics.upstream_requests_total.inc_by(drained.requests as f64);
            metrics.metrics.upstream_records_fetched.observe(drained.records.len() as f64);
            logging.log_upstream_drain(resource, drained.records.len(), drained.requests, elapsed_ms, true);
            Ok(drained.records)
        }
        Err(e) => {
            metrics.metrics.upstream_errors_total.inc();
            logging.log_upstream_drain(resource, 0, 0, elapsed_ms, false);
            Err(e)
        }
    }
}

/// Normalize upstream records, keeping the first record per identifier
fn normalize_products(records: Vec<Value>) -> Vec<Product> {
    let total = records.len();
    let mut seen = HashSet::with_capacity(total);
    let products: Vec<Product> = records
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| normalize_product(raw, &format!("{}#{}", PRODUCTS, index)))
        .filter(|product| seen.insert(product.id.clone()))
        .collect();

    if products.len() < total {
        debug!("Dropped {} unusable or duplicate product records", total - products.len());
    }
    products
}

/// Read and normalize every mirror record
fn load_mirror(reader: &ShardReader) -> CatalogResult<(Vec<Product>, usize)> {
    let mut records = reader.records()?;
    let mut seen = HashSet::new();
    let mut products = Vec::new();

    for record in records.by_ref() {
        match normalize_product(&record.value, &record.fallback_id()) {
            Some(product) if seen.insert(product.id.clone()) => products.push(product),
            Some(_) => {}
            None => warn!("Skipping non-object record {} in {}", record.index, record.shard),
        }
    }

    info!("Loaded {} products from {} shards", products.len(), records.shard_count());
    Ok((products, records.skipped_shards()))
}

/// Scan records in shard order, keeping the first occurrence of each
/// identifier and stopping once `max_matches` matches are collected
fn scan(reader: &ShardReader, matcher: &Matcher, max_matches: usize) -> CatalogResult<ScanOutcome> {
    let mut records = reader.records()?;
    let mut seen = HashSet::new();
    let mut matches = Vec::new();

    for record in records.by_ref() {
        let Some(product) = normalize_product(&record.value, &record.fallback_id()) else {
            warn!("Skipping non-object record {} in {}", record.index, record.shard);
            continue;
        };

        if !seen.insert(product.id.clone()) {
            continue;
        }

        if matcher.matches(&product) {
            matches.push(product);
            if matches.len() >= max_matches {
                debug!("Match cap of {} reached", max_matches);
                break;
            }
        }
    }

    Ok(ScanOutcome {
        matches,
        shards: records.shard_count(),
        skipped_shards: records.skipped_shards(),
    })
}
