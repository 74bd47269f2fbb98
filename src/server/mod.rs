use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Instrument};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use crate::catalog::{CatalogService, ProductCache};
use crate::chat::{
    extract_reply, tool_manifest, ChatClient, ChatRequest, ChatResponse, WebhookReply,
    WebhookRequest,
};
use crate::config::Config;
use crate::error::{CatalogError, CatalogResult};
use crate::observability::{health_routes, ObservabilityService};
use crate::types::{
    AllProductsParams, AllProductsResponse, CategoriesResponse, SearchPage, SearchParams,
    ShardMetadata,
};
use crate::upstream::{PageFetcher, UpstreamClient};

/// Characters of the access token shown by the debug endpoint
const TOKEN_PREVIEW_CHARS: usize = 10;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Main HTTP server structure
pub struct CatalogServer {
    app: Router,
    config: Config,
}

/// Shared application state
pub struct AppState {
    /// Application configuration
    pub config: Config,
    pub catalog: CatalogService,
    pub chat: ChatClient,
    pub observability: ObservabilityService,
}

impl AppState {
    /// State talking to the real store API
    pub fn new(config: Config) -> CatalogResult<Self> {
        let fetcher = Arc::new(UpstreamClient::new(config.upstream.clone())?);
        Self::with_fetcher(config, fetcher)
    }

    /// State with a caller-provided page source
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn PageFetcher>) -> CatalogResult<Self> {
        let cache = Arc::new(ProductCache::new(config.cache.ttl(), config.cache.max_entries));
        let observability = ObservabilityService::new(&config, cache.clone())?;

        let catalog = CatalogService::new(
            &config,
            fetcher,
            cache,
            observability.metrics.clone(),
            observability.logging.clone(),
        );
        let chat = ChatClient::new(&config.chat, observability.logging.clone())?;

        Ok(Self {
            config,
            catalog,
            chat,
            observability,
        })
    }
}

impl CatalogServer {
    /// Create a new server instance
    pub async fn new(config: Config) -> CatalogResult<Self> {
        info!("Initializing catalog connector components...");

        let state = Arc::new(AppState::new(config.clone())?);
        let app = router(state);

        info!(
            "Catalog connector initialized (mode: {:?}, cache ttl: {}s)",
            config.server.mode, config.cache.ttl_secs
        );
        Ok(CatalogServer { app, config })
    }

    /// Run the HTTP server
    pub async fn run(self) -> CatalogResult<()> {
        let bind_addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| CatalogError::Config(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        info!("HTTP server listening on {}", bind_addr);

        axum::serve(listener, self.app)
            .await
            .map_err(|e| CatalogError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// Build the full router over `state`
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any)
        .max_age(Duration::from_secs(3600));

    let health = state.observability.health.clone();

    Router::new()
        .route("/", get(root_handler))
        .route("/tiendanube/all-products", get(all_products_handler))
        .route("/tiendanube/categories", get(categories_handler))
        .route("/tiendanube/debug", get(debug_handler))
        .route("/local/search", get(search_handler))
        .route("/local/metadata", get(metadata_handler))
        .route("/lyzr/tools", get(tools_handler))
        .route("/lyzr/chat", post(chat_handler))
        .route("/webhook/input", post(webhook_handler))
        .route("/metrics", get(metrics_handler))
        .merge(health_routes().with_state(health))
        .layer(RequestBodyLimitLayer::new(state.config.server.max_request_size))
        .layer(middleware::from_fn(security_middleware))
        .layer(cors)
        .with_state(state)
}

/// Middleware for security headers
async fn security_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("X-XSS-Protection", HeaderValue::from_static("1; mode=block"));
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'self'; script-src 'none'; object-src 'none'"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    response
}

async fn root_handler() -> Json<Value> {
    Json(json!({ "status": "Catalog connector is running" }))
}

async fn all_products_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AllProductsParams>, QueryRejection>,
) -> ApiResult<AllProductsResponse> {
    let Query(params) = params.map_err(|e| reject(e.body_text()))?;
    let request = params.validate().map_err(|e| render_error(&e.into()))?;

    state
        .catalog
        .all_products(request)
        .instrument(crate::request_span!("all_products"))
        .await
        .map(Json)
        .map_err(|e| render_error(&e))
}

async fn categories_handler(State(state): State<Arc<AppState>>) -> ApiResult<CategoriesResponse> {
    state.catalog.categories().await.map(Json).map_err(|e| render_error(&e))
}

/// Credential presence and cache settings, never the full token
async fn debug_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let upstream = &state.config.upstream;
    let preview = upstream.access_token.as_deref().map(|token| {
        let head: String = token.chars().take(TOKEN_PREVIEW_CHARS).collect();
        format!("{}...", head)
    });

    Json(json!({
        "store_id": upstream.store_id,
        "access_token_exists": upstream.access_token.is_some(),
        "access_token_preview": preview,
        "cache_ttl": state.config.cache.ttl_secs,
        "mode": format!("{:?}", state.config.server.mode),
    }))
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<SearchPage> {
    let Query(params) = params.map_err(|e| reject(e.body_text()))?;
    let request = params.validate().map_err(|e| render_error(&e.into()))?;

    state
        .catalog
        .search(request)
        .instrument(crate::request_span!("search"))
        .await
        .map(Json)
        .map_err(|e| render_error(&e))
}

async fn metadata_handler(State(state): State<Arc<AppState>>) -> ApiResult<ShardMetadata> {
    state.catalog.metadata().await.map(Json).map_err(|e| render_error(&e))
}

async fn tools_handler() -> Json<Value> {
    Json(tool_manifest())
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let Json(body) = body.map_err(|e| reject(e.body_text()))?;

    let response = state.chat.forward(&body.message).await.map_err(|e| render_error(&e))?;
    Ok(Json(ChatResponse { response }))
}

async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<WebhookRequest>, JsonRejection>,
) -> ApiResult<WebhookReply> {
    let Json(body) = body.map_err(|e| reject(e.body_text()))?;

    let response = state.chat.forward(&body.text).await.map_err(|e| render_error(&e))?;
    Ok(Json(WebhookReply {
        reply: extract_reply(&response),
    }))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state.observability.metrics.gather().map_err(|e| render_error(&e))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response())
}

fn reject(message: String) -> ApiError {
    render_error(&CatalogError::InvalidRequest(message))
}

/// Render an error with its mapped status; upstream failures keep the
/// upstream status and body.
pub fn render_error(err: &CatalogError) -> ApiError {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);

    if status.is_server_error() {
        error!(error_type = err.error_type(), "Request failed: {}", err);
    } else {
        warn!(error_type = err.error_type(), "Request rejected: {}", err);
    }

    let (title, message) = match err {
        CatalogError::Upstream { body, .. } => ("Upstream error", body.clone()),
        CatalogError::UpstreamPayload(detail) => ("Upstream error", detail.clone()),
        CatalogError::NotFound(detail) => ("Not found", detail.clone()),
        CatalogError::InvalidRequest(detail) => ("Invalid request", detail.clone()),
        other => ("Internal error", other.to_string()),
    };

    (
        status,
        Json(ErrorResponse {
            error: title.to_string(),
            message,
        }),
    )
}

/// Error response structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
