//! Error types for the STAPI core.
//!
//! Every public operation returns [`StapiResult`]. The variants mirror the
//! failure kinds a transport binding has to map onto wire-level responses, and
//! each one carries enough structure (product id, order id, attempted
//! transition) for a caller to choose between retrying and giving up without
//! re-reading state.

use crate::state_machine::OrderState;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StapiError {
    /// Malformed or unschematic input. No state was changed.
    #[error("Invalid request{}: {reason}", product_suffix(.product_id))]
    InvalidRequest {
        product_id: Option<String>,
        reason: String,
    },

    /// A filter expression does not fit the product's constraint schema.
    #[error("Schema error for product {product_id}: {source}")]
    Schema {
        product_id: String,
        #[source]
        source: crate::filter::SchemaError,
    },

    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: Uuid },

    /// The tasking backend could not be reached. Transient.
    #[error("Tasking backend unavailable{}: {reason}", product_suffix(.product_id))]
    BackendUnavailable {
        product_id: Option<String>,
        reason: String,
    },

    /// The (state, event) pair is not in the transition table. No state was changed.
    #[error("Invalid transition for order {order_id}: {event} is not allowed from {from}")]
    InvalidTransition {
        order_id: Uuid,
        from: OrderState,
        event: String,
    },

    /// Lost a race against a concurrent transition on the same order.
    #[error(
        "Conflicting update on order {order_id} during {event}: expected {expected} at version {expected_version}, found {actual} at version {actual_version}"
    )]
    Conflict {
        order_id: Uuid,
        event: String,
        expected: OrderState,
        expected_version: usize,
        actual: OrderState,
        actual_version: usize,
    },

    /// The backend refused or failed to accept a dispatch. The order stays `accepted`.
    #[error("Dispatch failed for order {order_id}: {reason}")]
    DispatchError { order_id: Uuid, reason: String },

    /// A backend event could not be mapped onto a transition. The order is unchanged.
    #[error("Unrecognized backend event for order {order_id}: {detail}")]
    UnrecognizedBackendEvent { order_id: Uuid, detail: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn product_suffix(product_id: &Option<String>) -> String {
    product_id
        .as_deref()
        .map(|id| format!(" for product {id}"))
        .unwrap_or_default()
}

impl StapiError {
    /// Stable snake_case name of the failure kind, suitable for logs and wire codes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Schema { .. } => "schema_error",
            Self::ProductNotFound { .. } => "product_not_found",
            Self::OrderNotFound { .. } => "order_not_found",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Conflict { .. } => "conflict",
            Self::DispatchError { .. } => "dispatch_error",
            Self::UnrecognizedBackendEvent { .. } => "unrecognized_backend_event",
            Self::Configuration(_) => "configuration",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::Conflict { .. } | Self::DispatchError { .. }
        )
    }

    /// Order the failure refers to, if any.
    pub fn order_id(&self) -> Option<Uuid> {
        match self {
            Self::OrderNotFound { order_id }
            | Self::InvalidTransition { order_id, .. }
            | Self::Conflict { order_id, .. }
            | Self::DispatchError { order_id, .. }
            | Self::UnrecognizedBackendEvent { order_id, .. } => Some(*order_id),
            _ => None,
        }
    }

    pub(crate) fn invalid_request(product_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            product_id: product_id.map(str::to_string),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StapiError {
    fn from(error: serde_json::Error) -> Self {
        StapiError::InvalidRequest {
            product_id: None,
            reason: format!("JSON serialization error: {error}"),
        }
    }
}

pub type StapiResult<T> = Result<T, StapiError>;
