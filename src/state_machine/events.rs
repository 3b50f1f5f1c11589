use crate::models::BackendRef;
use serde::{Deserialize, Serialize};

/// Events that can trigger order state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OrderEvent {
    /// Admission checks passed
    AdmissionAccepted,
    /// Admission refused, with the reason shown to the client
    AdmissionRejected(String),
    /// The backend accepted the tasking and issued a reference
    DispatchSucceeded(BackendRef),
    /// Backend reports the tasking was fulfilled
    BackendSucceeded,
    /// Backend reports the tasking failed
    BackendFailed(String),
    /// Client asked to cancel
    ClientCancel,
}

impl OrderEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AdmissionAccepted => "admission_accepted",
            Self::AdmissionRejected(_) => "admission_rejected",
            Self::DispatchSucceeded(_) => "dispatch_succeeded",
            Self::BackendSucceeded => "backend_succeeded",
            Self::BackendFailed(_) => "backend_failed",
            Self::ClientCancel => "client_cancel",
        }
    }

    /// Reason recorded in the status history, if the event carries one
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::AdmissionRejected(reason) | Self::BackendFailed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn backend_ref(&self) -> Option<&BackendRef> {
        match self {
            Self::DispatchSucceeded(backend_ref) => Some(backend_ref),
            _ => None,
        }
    }

    /// Create an admission rejection with the given reason
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::AdmissionRejected(reason.into())
    }

    /// Create a backend failure with the given reason
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::BackendFailed(reason.into())
    }
}

/// Parses the payload-free events from their snake_case or prose names,
/// e.g. `"admission accepted"`, `"client cancels"`, `"backend_succeeded"`.
impl std::str::FromStr for OrderEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "admission_accepted" | "accept" => Ok(Self::AdmissionAccepted),
            "client_cancel" | "client_cancels" | "cancel" => Ok(Self::ClientCancel),
            "backend_succeeded" | "backend_reports_success" | "success" => {
                Ok(Self::BackendSucceeded)
            }
            "admission_rejected" | "backend_failed" | "backend_reports_failure"
            | "dispatch_succeeded" | "dispatch_succeeds" => {
                Err(format!("Order event '{s}' needs a payload and cannot be parsed from text"))
            }
            _ => Err(format!("Invalid order event: {s}")),
        }
    }
}
