use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::PageFetcher;
use crate::config::{AuthScheme, UpstreamConfig};
use crate::error::{CatalogError, CatalogResult};

/// HTTP client for the store API
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    store_url: String,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> CatalogResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CatalogError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            store_url: config.store_url(),
            config,
        })
    }

    /// Headers sent with every request.
    ///
    /// A missing token is sent as an empty credential so the store rejects
    /// the request and the rejection is relayed to the caller.
    fn headers(&self) -> CatalogResult<HeaderMap> {
        let token = self.config.access_token.as_deref().unwrap_or_default();
        let credential = match self.config.auth_scheme {
            AuthScheme::Bearer => format!("bearer {}", token),
            AuthScheme::Raw => token.to_string(),
        };

        let name = HeaderName::from_bytes(self.config.auth_header.as_bytes()).map_err(|e| {
            CatalogError::Config(format!("Invalid auth header name '{}': {}", self.config.auth_header, e))
        })?;
        let value = HeaderValue::from_str(credential.trim_end())
            .map_err(|e| CatalogError::Config(format!("Invalid access token: {}", e)))?;
        let agent = HeaderValue::from_str(&self.config.user_agent)
            .map_err(|e| CatalogError::Config(format!("Invalid user agent: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(name, value);
        headers.insert(USER_AGENT, agent);
        Ok(headers)
    }

    fn resource_url(&self, resource: &str) -> String {
        format!("{}/{}", self.store_url, resource)
    }
}

#[async_trait]
impl PageFetcher for UpstreamClient {
    async fn fetch_page(&self, resource: &str, page: usize, per_page: usize) -> CatalogResult<Vec<Value>> {
        let url = self.resource_url(resource);
        debug!("GET {} page={} per_page={}", url, page, per_page);

        let response = self
            .http
            .get(&url)
            .headers(self.headers()?)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            warn!("Upstream {} page {} returned {}", resource, page, status);
            return Err(CatalogError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| CatalogError::UpstreamPayload(format!("{} page {}: {}", resource, page, e)))?;

        records_of(payload, resource).ok_or_else(|| {
            CatalogError::UpstreamPayload(format!("{} page {} is not a list of records", resource, page))
        })
    }
}

/// Records of a page body: the array itself, or from an object envelope the
/// array keyed by `resource`, else the only array it holds
pub(super) fn records_of(payload: Value, resource: &str) -> Option<Vec<Value>> {
    match payload {
        Value::Array(records) => Some(records),
        Value::Object(mut map) => {
            if let Some(Value::Array(records)) = map.remove(resource) {
                return Some(records);
            }
            let mut arrays = map.into_iter().filter_map(|(_, value)| match value {
                Value::Array(records) => Some(records),
                _ => None,
            });
            match (arrays.next(), arrays.next()) {
                (Some(records), None) => Some(records),
                _ => None,
            }
        }
        _ => None,
    }
}

fn transport_error(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::upstream_timeout()
    } else {
        CatalogError::Upstream {
            status: 502,
            body: err.to_string(),
        }
    }
}
