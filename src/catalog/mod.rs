//! Catalog aggregation: record normalization and the service answering
//! product, category and search queries.

pub mod normalize;
mod service;

pub use normalize::{normalize_category, normalize_product};
pub use service::{CatalogService, ProductCache};
