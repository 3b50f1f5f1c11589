use super::states::OrderState;
use crate::error::StapiError;
use thiserror::Error;
use uuid::Uuid;

/// Guard condition failures. The transition is refused and nothing is written.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Order {order_id} already has backend reference {backend_ref}")]
    BackendRefAlreadySet { order_id: Uuid, backend_ref: String },

    #[error("Event {event} requires a non-empty reason")]
    ReasonRequired { event: String },
}

/// Post-transition action failures. Logged, never surfaced to the caller,
/// since the transition is already durable when actions run.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Event publishing failed: {event_name}")]
    EventPublishFailed { event_name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Order store failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("Order {order_id} not found")]
    NotFound { order_id: Uuid },

    #[error("Order {order_id} already exists")]
    AlreadyExists { order_id: Uuid },

    #[error(
        "Concurrent modification detected for order {order_id}: expected {expected} at version {expected_version}, found {actual} at version {actual_version}"
    )]
    ConcurrentModification {
        order_id: Uuid,
        expected: OrderState,
        expected_version: usize,
        actual: OrderState,
        actual_version: usize,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PersistenceError {
    /// Map onto the public taxonomy, naming the event that was being applied.
    pub fn into_stapi_error(self, event: &str) -> StapiError {
        match self {
            Self::NotFound { order_id } => StapiError::OrderNotFound { order_id },
            Self::AlreadyExists { order_id } => {
                StapiError::Internal(format!("duplicate order id {order_id}"))
            }
            Self::ConcurrentModification {
                order_id,
                expected,
                expected_version,
                actual,
                actual_version,
            } => StapiError::Conflict {
                order_id,
                event: event.to_string(),
                expected,
                expected_version,
                actual,
                actual_version,
            },
            Self::Storage(reason) => StapiError::Internal(reason),
        }
    }
}

pub type GuardResult<T> = Result<T, GuardError>;
pub type ActionResult<T> = Result<T, ActionError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl From<PersistenceError> for StapiError {
    fn from(err: PersistenceError) -> Self {
        err.into_stapi_error("unknown")
    }
}
