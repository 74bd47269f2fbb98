//! Chat forward to the hosted agent endpoint, plus the tool manifest the
//! agent reads to discover catalog operations.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::observability::LoggingService;

/// Body of `POST /lyzr/chat`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Body of `POST /webhook/input`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Agent response, untouched
    pub response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookReply {
    pub reply: String,
}

/// Client for the agent completion endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    base_url: Option<String>,
    api_key: Option<String>,
    logging: LoggingService,
}

impl ChatClient {
    pub fn new(config: &ChatConfig, logging: LoggingService) -> CatalogResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            logging,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Forward `message` as a single user turn and return the raw response
    pub async fn forward(&self, message: &str) -> CatalogResult<Value> {
        let url = self
            .base_url
            .as_deref()
            .ok_or_else(|| CatalogError::Config("LYZR_BASE_URL is not set".to_string()))?;

        let started = Instant::now();
        let result = self.send(url, message).await;
        self.logging
            .log_chat_forward(message, started.elapsed().as_secs_f64() * 1000.0, result.is_ok());
        result
    }

    async fn send(&self, url: &str, message: &str) -> CatalogResult<Value> {
        let body = json!({ "input": [{ "role": "user", "content": message }] });

        let mut request = self.http.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::upstream_timeout()
            } else {
                CatalogError::Upstream {
                    status: 502,
                    body: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| CatalogError::Upstream {
            status: 502,
            body: e.to_string(),
        })?;

        if !status.is_success() {
            warn!("Chat endpoint returned {}", status);
            return Err(CatalogError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!("Chat endpoint answered {} bytes", text.len());
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

/// Readable reply text of an agent response.
///
/// Takes `output[0].content[0].text`; anything else falls back to the raw
/// response rendered as text.
pub fn extract_reply(response: &Value) -> String {
    match response.pointer("/output/0/content/0/text") {
        Some(Value::String(text)) => text.clone(),
        _ => match response {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        },
    }
}

/// Catalog operations advertised to the agent
pub fn tool_manifest() -> Value {
    json!({
        "mcp_version": "1.0",
        "tools": [
            {
                "name": "get_all_products",
                "description": "Returns every store product, optionally one page of them or filtered by keywords.",
                "endpoint": "/tiendanube/all-products",
                "method": "GET",
                "params": {
                    "page": "optional page number",
                    "per_page": "optional page size",
                    "filter": "optional keywords, all must match",
                    "use_cache": "set to false to force a refresh"
                }
            },
            {
                "name": "get_categories",
                "description": "Returns every product category.",
                "endpoint": "/tiendanube/categories",
                "method": "GET",
                "params": {}
            },
            {
                "name": "search_products",
                "description": "Keyword search over the local catalog mirror (name, brand, category, color, size).",
                "endpoint": "/local/search",
                "method": "GET",
                "params": {
                    "query": "required search text",
                    "page": "page number, default 1",
                    "per_page": "page size, default 50",
                    "mode": "keywords or accent_insensitive"
                }
            }
        ]
    })
}
