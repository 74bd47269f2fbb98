/// Upstream store API access
///
/// [`PageFetcher`] is the seam between the drain loop and the HTTP client so
/// the loop can be exercised without a network.

mod client;
mod drain;

pub use client::UpstreamClient;
pub use drain::{drain, Drained};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CatalogResult;

/// Products collection of the store API
pub const PRODUCTS: &str = "products";
/// Categories collection of the store API
pub const CATEGORIES: &str = "categories";

/// Fetches one page of a paginated upstream collection
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Raw records of `resource` on the 1-based `page`
    async fn fetch_page(&self, resource: &str, page: usize, per_page: usize) -> CatalogResult<Vec<Value>>;
}
