pub mod cache;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod observability;
pub mod search;
pub mod server;
pub mod shards;
pub mod types;
pub mod upstream;

pub use cache::{SingleFlight, TtlCache};
pub use catalog::{CatalogService, ProductCache};
pub use chat::ChatClient;
pub use config::Config;
pub use error::{CatalogError, CatalogResult};
pub use search::{paginate, KeywordMatcher, Matcher};
pub use server::{AppState, CatalogServer};
pub use shards::ShardReader;
pub use types::*;
pub use upstream::{drain, PageFetcher, UpstreamClient};
