/// Caching module
///
/// This module holds the in-process pieces used to avoid redundant upstream
/// drains:
/// - [`TtlCache`]: bounded key/value store whose entries expire after a TTL
/// - [`SingleFlight`]: coalesces concurrent computations of the same key

mod single_flight;
mod ttl;

pub use single_flight::SingleFlight;
pub use ttl::{CacheStats, Clock, ManualClock, SystemClock, TtlCache};

/// Cache key of the full product drain
pub const ALL_PRODUCTS_KEY: &str = "all_products";

/// Cache key of a single upstream product page
pub fn product_page_key(page: usize, per_page: usize) -> String {
    format!("products:page={}:per_page={}", page, per_page)
}

#[cfg(test)]
mod tests;
