//! # Structured Logging Module
//!
//! Subscriber setup plus a few helpers that give the main operations a
//! consistent set of structured fields.

use crate::config::LoggingConfig;
use crate::state_machine::OrderState;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// `RUST_LOG` wins over `config.level` when set. If another global subscriber
/// is already installed it is left in place.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .unwrap_or_else(|_| EnvFilter::new(crate::constants::defaults::LOG_LEVEL));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
            return;
        }

        tracing::info!(
            level = %config.level,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Log structured data for order lifecycle operations
pub fn log_order_operation(
    operation: &str,
    order_id: Option<Uuid>,
    product_id: Option<&str>,
    from_state: Option<OrderState>,
    to_state: OrderState,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        order_id = order_id.map(|id| id.to_string()),
        product_id = product_id,
        from_state = from_state.map(|s| s.as_str()),
        to_state = %to_state,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 ORDER_OPERATION"
    );
}

/// Log structured data for opportunity searches
pub fn log_search_operation(
    product_id: &str,
    backend: &str,
    candidates: usize,
    returned: usize,
    has_next: bool,
    duration_ms: u64,
) {
    tracing::info!(
        product_id = %product_id,
        backend = %backend,
        candidates = candidates,
        returned = returned,
        has_next = has_next,
        duration_ms = duration_ms,
        timestamp = %Utc::now().to_rfc3339(),
        "🔭 SEARCH_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
