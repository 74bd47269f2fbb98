use thiserror::Error;

/// Main error type for the catalog connector
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Upstream answered with a non-success status, or the call failed in transit
    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// Upstream answered 2xx with a body that carries no record array
    #[error("Unexpected upstream payload: {0}")]
    UpstreamPayload(String),

    /// A local shard could not be parsed into a record list
    #[error("Malformed shard {shard}: {reason}")]
    MalformedShard { shard: String, reason: String },

    /// A required local resource is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Timeout while talking to the upstream API
    pub fn upstream_timeout() -> Self {
        CatalogError::Upstream {
            status: 504,
            body: "Upstream request timed out".to_string(),
        }
    }

    /// Check if error originated upstream
    pub fn is_upstream_error(&self) -> bool {
        matches!(
            self,
            CatalogError::Upstream { .. } | CatalogError::UpstreamPayload(_)
        )
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            CatalogError::Upstream { status, .. } => *status,
            CatalogError::UpstreamPayload(_) => 502,
            CatalogError::MalformedShard { .. } => 500,
            CatalogError::NotFound(_) => 404,
            CatalogError::InvalidRequest(_) => 400,
            CatalogError::Config(_) => 500,
            CatalogError::Io(_) => 500,
            CatalogError::Serialization(_) => 500,
            CatalogError::Internal(_) => 500,
        }
    }

    /// Get error type as string for logging
    pub fn error_type(&self) -> &'static str {
        match self {
            CatalogError::Upstream { .. } => "upstream_error",
            CatalogError::UpstreamPayload(_) => "upstream_payload_error",
            CatalogError::MalformedShard { .. } => "malformed_shard",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::InvalidRequest(_) => "invalid_request",
            CatalogError::Config(_) => "config_error",
            CatalogError::Io(_) => "io_error",
            CatalogError::Serialization(_) => "serialization_error",
            CatalogError::Internal(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Serialization(err.to_string())
    }
}

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Validation error for request parameters
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid page parameter: {0}")]
    InvalidPage(String),

    #[error("Invalid per_page parameter: {0}")]
    InvalidPerPage(String),

    #[error("Invalid search mode: {0}")]
    InvalidMode(String),
}

impl From<ValidationError> for CatalogError {
    fn from(err: ValidationError) -> Self {
        CatalogError::InvalidRequest(err.to_string())
    }
}
