use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CatalogError, CatalogResult};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Upstream store API configuration
    pub upstream: UpstreamConfig,
    /// Aggregation cache configuration
    pub cache: CacheConfig,
    /// Local mirror configuration
    pub local: LocalConfig,
    /// Chat forward configuration
    pub chat: ChatConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Where "get all products" reads from
    pub mode: CatalogMode,
}

/// Source used to materialize the full product list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogMode {
    /// Drain the remote store API
    Upstream,
    /// Scan the local shard mirror
    LocalMirror,
}

impl FromStr for CatalogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upstream" | "remote" => Ok(CatalogMode::Upstream),
            "local" | "mirror" | "local_mirror" => Ok(CatalogMode::LocalMirror),
            other => Err(format!("unknown catalog mode '{}'", other)),
        }
    }
}

/// How the access token is rendered in the authorization header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `bearer <token>`
    Bearer,
    /// `<token>`
    Raw,
}

impl FromStr for AuthScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bearer" => Ok(AuthScheme::Bearer),
            "raw" | "none" => Ok(AuthScheme::Raw),
            other => Err(format!("unknown auth scheme '{}'", other)),
        }
    }
}

/// Upstream store API configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// API base URL, without the store segment
    pub base_url: String,
    /// Store identifier
    pub store_id: Option<String>,
    /// Access token; absence surfaces as an upstream authorization failure
    pub access_token: Option<String>,
    /// Header carrying the token
    pub auth_header: String,
    pub auth_scheme: AuthScheme,
    /// Descriptive client identifier sent as User-Agent
    pub user_agent: String,
    /// Page size requested while draining
    pub per_page: usize,
    /// Hard ceiling on records fetched by one drain
    pub max_records: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    /// Store-scoped API root, e.g. `https://api.tiendanube.com/v1/123`
    pub fn store_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.store_id.as_deref().unwrap_or_default()
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Aggregation cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds
    pub ttl_secs: u64,
    /// Maximum number of entries
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Local mirror configuration
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Directory holding `products_<n>.json` shards
    pub data_dir: PathBuf,
    /// Single flat file scanned by search instead of the shards
    pub search_file: Option<PathBuf>,
    /// Safety cap on accumulated search matches
    pub max_matches: usize,
}

/// Chat forward configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> CatalogResult<Self> {
        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            tracing::warn!("Could not load .env file: {}", e);
        }

        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: parse_var("PORT", defaults.server.port)?,
                max_request_size: parse_var("MAX_REQUEST_SIZE", defaults.server.max_request_size)?,
                mode: parse_var("CATALOG_MODE", defaults.server.mode)?,
            },
            upstream: UpstreamConfig {
                base_url: env::var("TIENDANUBE_API_URL").unwrap_or(defaults.upstream.base_url),
                store_id: optional_var("TIENDANUBE_STORE_ID"),
                access_token: optional_var("TIENDANUBE_ACCESS_TOKEN"),
                auth_header: env::var("TIENDANUBE_AUTH_HEADER")
                    .unwrap_or(defaults.upstream.auth_header),
                auth_scheme: parse_var("TIENDANUBE_AUTH_SCHEME", defaults.upstream.auth_scheme)?,
                user_agent: env::var("TIENDANUBE_USER_AGENT")
                    .unwrap_or(defaults.upstream.user_agent),
                per_page: parse_var("TIENDANUBE_PER_PAGE", defaults.upstream.per_page)?,
                max_records: parse_var("TIENDANUBE_MAX_RECORDS", defaults.upstream.max_records)?,
                timeout_secs: parse_var("TIENDANUBE_TIMEOUT_SECS", defaults.upstream.timeout_secs)?,
            },
            cache: CacheConfig {
                ttl_secs: parse_var("TIENDANUBE_CACHE_TTL", defaults.cache.ttl_secs)?,
                max_entries: parse_var("CATALOG_CACHE_MAX_ENTRIES", defaults.cache.max_entries)?,
            },
            local: LocalConfig {
                data_dir: optional_var("LOCAL_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.local.data_dir),
                search_file: optional_var("LOCAL_SEARCH_FILE").map(PathBuf::from),
                max_matches: parse_var("LOCAL_SEARCH_MAX_MATCHES", defaults.local.max_matches)?,
            },
            chat: ChatConfig {
                api_key: optional_var("LYZR_API_KEY"),
                base_url: optional_var("LYZR_BASE_URL"),
                timeout_secs: parse_var("LYZR_TIMEOUT_SECS", defaults.chat.timeout_secs)?,
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration; credentials are checked lazily by upstream
    pub fn validate(&self) -> CatalogResult<()> {
        if self.server.port == 0 {
            return Err(CatalogError::Config("Server port cannot be 0".to_string()));
        }

        if url::Url::parse(&self.upstream.base_url).is_err() {
            return Err(CatalogError::Config(format!(
                "TIENDANUBE_API_URL is not a valid URL: {}",
                self.upstream.base_url
            )));
        }

        if self.upstream.per_page == 0 {
            return Err(CatalogError::Config("Per-page size must be greater than 0".to_string()));
        }

        if self.upstream.max_records == 0 {
            return Err(CatalogError::Config(
                "Upstream record ceiling must be greater than 0".to_string(),
            ));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(CatalogError::Config("Upstream timeout must be greater than 0".to_string()));
        }

        if self.cache.ttl_secs == 0 {
            return Err(CatalogError::Config("Cache TTL must be greater than 0".to_string()));
        }

        if self.cache.max_entries == 0 {
            return Err(CatalogError::Config("Cache capacity must be greater than 0".to_string()));
        }

        if self.local.max_matches == 0 {
            return Err(CatalogError::Config("Search match cap must be greater than 0".to_string()));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 10000,
                max_request_size: 32768, // 32KB
                mode: CatalogMode::Upstream,
            },
            upstream: UpstreamConfig {
                base_url: "https://api.tiendanube.com/v1".to_string(),
                store_id: None,
                access_token: None,
                auth_header: "Authentication".to_string(),
                auth_scheme: AuthScheme::Bearer,
                user_agent: format!("catalog-connector/{}", env!("CARGO_PKG_VERSION")),
                per_page: 200,
                max_records: 1000,
                timeout_secs: 30,
            },
            cache: CacheConfig {
                ttl_secs: 600,
                max_entries: 4,
            },
            local: LocalConfig {
                data_dir: PathBuf::from("data"),
                search_file: None,
                max_matches: 1000,
            },
            chat: ChatConfig {
                api_key: None,
                base_url: None,
                timeout_secs: 60,
            },
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> CatalogResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CatalogError::Config(format!("Invalid {}: {}", name, e))),
        None => Ok(default),
    }
}
