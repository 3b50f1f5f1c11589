//! # Tasking Backend
//!
//! The external system that schedules (or simulates) sensor tasking. The core
//! calls into it for candidate windows during search, and for dispatch,
//! cancellation and status once an order is accepted.
//!
//! Backend updates arrive as [`BackendEvent`]s with a free-form `kind`; whether
//! they are pushed by the backend or pulled with [`TaskingBackend::status`] is
//! up to the caller.

pub mod simulated;

pub use simulated::SimulatedBackend;

use crate::models::{BackendRef, DatetimeInterval, Geometry, Order, Price, Product};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// What a backend can do beyond the required operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Enables cancelling orders that are already `in_progress`.
    #[serde(default)]
    pub supports_mid_flight_cancel: bool,
}

/// Area and window a search asks the backend to schedule within
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub geometry: Geometry,
    pub datetime: DatetimeInterval,
}

/// A feasible window as reported by the backend, before filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateWindow {
    pub id: String,
    pub datetime: DatetimeInterval,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

/// Raw status update for dispatched tasking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEvent {
    pub backend_ref: BackendRef,
    /// `progress`, `succeeded`, `failed` or `cancelled`, plus common synonyms.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Typed reading of a [`BackendEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    Progress,
    Succeeded,
    Failed { reason: String },
    Cancelled,
}

impl BackendEvent {
    pub fn new(backend_ref: BackendRef, kind: impl Into<String>) -> Self {
        Self {
            backend_ref,
            kind: kind.into(),
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// `None` when the kind is not recognized.
    pub fn outcome(&self) -> Option<BackendOutcome> {
        let kind = self.kind.trim().to_ascii_lowercase().replace('-', "_");
        match kind.as_str() {
            "progress" | "in_progress" | "running" | "scheduled" => Some(BackendOutcome::Progress),
            "succeeded" | "success" | "completed" | "complete" => Some(BackendOutcome::Succeeded),
            "failed" | "failure" | "error" => Some(BackendOutcome::Failed {
                reason: self
                    .message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "backend reported failure".to_string()),
            }),
            "cancelled" | "canceled" => Some(BackendOutcome::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// Could not reach the backend. Transient.
    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },

    /// The backend understood the request and refused it.
    #[error("backend rejected the request: {reason}")]
    Rejected { reason: String },

    #[error("backend has no tasking for reference {backend_ref}")]
    NotFound { backend_ref: String },

    #[error("backend error: {0}")]
    Internal(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait TaskingBackend: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Candidate windows for `product` within the query's area and window.
    async fn find_opportunities(
        &self,
        product: &Product,
        query: &CandidateQuery,
    ) -> BackendResult<Vec<CandidateWindow>>;

    async fn dispatch(&self, order: &Order) -> BackendResult<BackendRef>;

    async fn cancel(&self, backend_ref: &BackendRef) -> BackendResult<()>;

    /// Current status of dispatched tasking, as an event.
    async fn status(&self, backend_ref: &BackendRef) -> BackendResult<BackendEvent>;
}
