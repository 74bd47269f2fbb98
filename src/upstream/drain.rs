use serde_json::Value;
use tracing::{debug, info};

use super::PageFetcher;
use crate::error::CatalogResult;

/// Result of draining a paginated collection
#[derive(Debug, Clone, Default)]
pub struct Drained {
    pub records: Vec<Value>,
    /// Page requests issued
    pub requests: usize,
    /// Whether the ceiling cut the drain short
    pub truncated: bool,
}

/// Fetch pages 1, 2, ... of `resource` sequentially and concatenate them.
///
/// Stops on an empty page, on a page shorter than `per_page`, or once
/// `max_records` have been collected; the result never exceeds the ceiling.
/// The first failing page aborts the drain and its error is returned.
pub async fn drain(
    fetcher: &dyn PageFetcher,
    resource: &str,
    per_page: usize,
    max_records: usize,
) -> CatalogResult<Drained> {
    let per_page = per_page.max(1);
    let mut drained = Drained::default();
    let mut page = 1;

    loop {
        let batch = fetcher.fetch_page(resource, page, per_page).await?;
        drained.requests += 1;

        if batch.is_empty() {
            break;
        }

        let short_page = batch.len() < per_page;
        drained.records.extend(batch);
        debug!("Drained {} page {} ({} records so far)", resource, page, drained.records.len());

        if drained.records.len() >= max_records {
            drained.truncated = drained.records.len() > max_records || !short_page;
            drained.records.truncate(max_records);
            break;
        }

        if short_page {
            break;
        }

        page += 1;
    }

    info!(
        "Drained {} {} records in {} requests{}",
        drained.records.len(),
        resource,
        drained.requests,
        if drained.truncated { " (ceiling reached)" } else { "" }
    );

    Ok(drained)
}
