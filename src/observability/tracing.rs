use tracing::subscriber::set_global_default;
use tracing_subscriber::{
    fmt::{self, format::JsonFields},
    layer::SubscriberExt,
    EnvFilter, Registry,
};
use crate::error::{CatalogError, CatalogResult};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,catalog_connector=debug";

/// Initialize global tracing subscriber with JSON formatting
pub fn init_tracing() -> CatalogResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let formatting_layer = fmt::layer()
        .json()
        .with_current_span(false)
        .with_span_list(true)
        .fmt_fields(JsonFields::new());

    let subscriber = Registry::default()
        .with(env_filter)
        .with(formatting_layer);

    set_global_default(subscriber)
        .map_err(|e| CatalogError::Internal(format!("Failed to set global subscriber: {}", e)))?;

    Ok(())
}

/// Span carrying a fresh `trace_id`, one per handled request
#[macro_export]
macro_rules! request_span {
    ($name:expr) => {
        tracing::info_span!($name, trace_id = %uuid::Uuid::new_v4())
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, trace_id = %uuid::Uuid::new_v4(), $($field)*)
    };
}
