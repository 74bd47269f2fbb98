use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::env;
use std::sync::OnceLock;
use tracing::{event, Level};
use uuid::Uuid;
use crate::error::CatalogError;

/// Structured JSON logging service with trace_id injection
#[derive(Debug, Clone)]
pub struct LoggingService {
    service_name: String,
    service_version: String,
    environment: String,
}

impl Default for LoggingService {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingService {
    pub fn new() -> Self {
        let service_name = env::var("SERVICE_NAME")
            .unwrap_or_else(|_| "catalog-connector".to_string());

        let service_version = env::var("SERVICE_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string());

        Self {
            service_name,
            service_version,
            environment,
        }
    }

    /// Log a structured message with trace_id
    pub fn log_structured(&self, level: Level, message: &str, fields: Option<HashMap<String, Value>>) {
        let trace_id = Uuid::new_v4();

        let mut log_entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level.to_string().to_uppercase(),
            "message": message,
            "trace_id": trace_id.to_string(),
            "service": {
                "name": self.service_name,
                "version": self.service_version,
                "environment": self.environment
            }
        });

        if let (Some(fields), Value::Object(map)) = (fields, &mut log_entry) {
            map.extend(fields);
        }

        match level {
            Level::ERROR => event!(Level::ERROR, %trace_id, "{}", log_entry),
            Level::WARN => event!(Level::WARN, %trace_id, "{}", log_entry),
            Level::INFO => event!(Level::INFO, %trace_id, "{}", log_entry),
            Level::DEBUG => event!(Level::DEBUG, %trace_id, "{}", log_entry),
            Level::TRACE => event!(Level::TRACE, %trace_id, "{}", log_entry),
        }
    }

    /// Log local search request with sanitized query
    pub fn log_search_request(&self, query: &str, page: usize, per_page: usize, mode: &str) {
        let fields = HashMap::from([
            ("query_length".to_string(), json!(query.chars().count())),
            ("sanitized_query".to_string(), json!(sanitize_query(query))),
            ("page".to_string(), json!(page)),
            ("per_page".to_string(), json!(per_page)),
            ("mode".to_string(), json!(mode)),
        ]);

        self.log_structured(Level::INFO, "Search request received", Some(fields));
    }

    /// Log local search completion
    pub fn log_search_response(&self, duration_ms: f64, results_count: usize, total_found: usize, shards: usize) {
        let fields = HashMap::from([
            ("duration_ms".to_string(), json!(duration_ms)),
            ("results_count".to_string(), json!(results_count)),
            ("total_found".to_string(), json!(total_found)),
            ("shards_scanned".to_string(), json!(shards)),
        ]);

        self.log_structured(Level::INFO, "Search request completed", Some(fields));
    }

    /// Log error with context
    pub fn log_error(&self, error: &CatalogError, context: Option<HashMap<String, Value>>) {
        let mut fields = HashMap::from([
            ("error_type".to_string(), json!(error.error_type())),
            ("error_message".to_string(), json!(truncate(&error.to_string(), 500))),
            ("status_code".to_string(), json!(error.status_code())),
        ]);

        if let Some(context) = context {
            fields.extend(context);
        }

        self.log_structured(Level::ERROR, "Error occurred", Some(fields));
    }

    /// Log aggregation cache lookup
    pub fn log_cache_operation(&self, operation: &str, key: &str, hit: bool) {
        let fields = HashMap::from([
            ("operation".to_string(), json!(operation)),
            ("key".to_string(), json!(key)),
            ("hit".to_string(), json!(hit)),
        ]);

        self.log_structured(Level::DEBUG, "Cache operation", Some(fields));
    }

    /// Log a finished upstream aggregation
    pub fn log_upstream_drain(
        &self,
        resource: &str,
        records: usize,
        requests: usize,
        duration_ms: f64,
        success: bool,
    ) {
        let fields = HashMap::from([
            ("resource".to_string(), json!(resource)),
            ("records".to_string(), json!(records)),
            ("requests".to_string(), json!(requests)),
            ("duration_ms".to_string(), json!(duration_ms)),
            ("success".to_string(), json!(success)),
        ]);

        let (level, message) = if success {
            (Level::INFO, "Upstream aggregation completed")
        } else {
            (Level::WARN, "Upstream aggregation failed")
        };

        self.log_structured(level, message, Some(fields));
    }

    /// Log a forwarded chat message
    pub fn log_chat_forward(&self, message: &str, duration_ms: f64, success: bool) {
        let fields = HashMap::from([
            ("message_length".to_string(), json!(message.chars().count())),
            ("duration_ms".to_string(), json!(duration_ms)),
            ("success".to_string(), json!(success)),
        ]);

        let level = if success { Level::INFO } else { Level::WARN };
        self.log_structured(level, "Chat message forwarded", Some(fields));
    }
}

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").ok())
        .as_ref()
}

fn phone_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").ok())
        .as_ref()
}

/// Sanitize query for logging (mask contact details, truncate)
pub fn sanitize_query(query: &str) -> String {
    let mut sanitized = query.to_string();

    if let Some(pattern) = email_pattern() {
        sanitized = pattern.replace_all(&sanitized, "[EMAIL]").to_string();
    }
    if let Some(pattern) = phone_pattern() {
        sanitized = pattern.replace_all(&sanitized, "[PHONE]").to_string();
    }

    truncate(&sanitized, 200)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars - 3).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_service_creation() {
        let service = LoggingService::new();
        assert!(!service.service_name.is_empty());
        assert!(!service.service_version.is_empty());
    }

    #[test]
    fn test_query_sanitization() {
        let sanitized = sanitize_query("zapatillas para juan.perez@example.com");
        assert!(sanitized.contains("[EMAIL]"));
        assert!(!sanitized.contains("juan.perez@example.com"));

        let sanitized = sanitize_query("llamar al 555-123-4567 por talle 42");
        assert!(sanitized.contains("[PHONE]"));
        assert!(sanitized.contains("talle 42"));
    }

    #[test]
    fn test_sanitization_truncates_on_char_boundary() {
        let long = "ñ".repeat(300);
        let sanitized = sanitize_query(&long);
        assert_eq!(sanitized.chars().count(), 200);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn test_logging_methods_do_not_panic() {
        let service = LoggingService::new();

        service.log_search_request("nike negro", 1, 50, "keywords");
        service.log_search_response(12.5, 3, 3, 2);
        service.log_cache_operation("get", "all_products", true);
        service.log_upstream_drain("products", 800, 5, 320.0, true);
        service.log_chat_forward("hola", 80.0, false);
        service.log_error(&CatalogError::NotFound("data".into()), None);
    }
}
