//! # Orders
//!
//! An [`Order`] is a client's commitment to one opportunity. It embeds a frozen
//! copy of that opportunity, so later catalog or backend changes never leak into
//! an admitted order, and an append-only status history.
//!
//! Fields are private: only the order state machine creates orders and moves
//! them between states, which keeps `status == history.last().status` true for
//! every value that exists.

use super::opportunity::{Opportunity, SearchParameters};
use crate::state_machine::OrderState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Backend-issued handle for dispatched tasking. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackendRef(String);

impl BackendRef {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err("backend reference must not be empty".to_string());
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BackendRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BackendRef> for String {
    fn from(value: BackendRef) -> Self {
        value.0
    }
}

impl fmt::Display for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a client submits to create an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub product_id: String,
    /// The opportunity the client selected, copied from a search response.
    pub opportunity: Opportunity,
    #[serde(default)]
    pub order_parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_parameters: Option<SearchParameters>,
}

impl OrderDraft {
    pub fn new(opportunity: Opportunity) -> Self {
        Self {
            product_id: opportunity.product_id.clone(),
            opportunity,
            order_parameters: Map::new(),
            search_parameters: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.order_parameters.insert(name.into(), value);
        self
    }

    pub fn with_search_parameters(mut self, search_parameters: SearchParameters) -> Self {
        self.search_parameters = Some(search_parameters);
        self
    }
}

/// Immutable entry in an order's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: OrderState,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Event type that produced this record; `None` for the creation record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OrderRecord")]
pub struct Order {
    id: Uuid,
    product_id: String,
    opportunity: Opportunity,
    order_parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search_parameters: Option<SearchParameters>,
    status: OrderState,
    history: Vec<StatusRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backend_ref: Option<BackendRef>,
    created_at: DateTime<Utc>,
}

/// Wire shape of an [`Order`], checked before it becomes one.
#[derive(Deserialize)]
struct OrderRecord {
    id: Uuid,
    product_id: String,
    opportunity: Opportunity,
    order_parameters: Map<String, Value>,
    #[serde(default)]
    search_parameters: Option<SearchParameters>,
    status: OrderState,
    history: Vec<StatusRecord>,
    #[serde(default)]
    backend_ref: Option<BackendRef>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = String;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        match record.history.first() {
            Some(first) if first.status == OrderState::Pending => {}
            Some(first) => {
                return Err(format!(
                    "order {} history starts at {} instead of pending",
                    record.id, first.status
                ));
            }
            None => return Err(format!("order {} has no status history", record.id)),
        }
        if record.history.last().map(|last| last.status) != Some(record.status) {
            return Err(format!(
                "order {} status {} does not match its latest status record",
                record.id, record.status
            ));
        }
        if record
            .history
            .windows(2)
            .any(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(format!("order {} history goes back in time", record.id));
        }

        Ok(Self {
            id: record.id,
            product_id: record.product_id,
            opportunity: record.opportunity,
            order_parameters: record.order_parameters,
            search_parameters: record.search_parameters,
            status: record.status,
            history: record.history,
            backend_ref: record.backend_ref,
            created_at: record.created_at,
        })
    }
}

impl Order {
    /// Create a `pending` order together with its first status record.
    pub(crate) fn new_pending(draft: OrderDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: draft.product_id,
            opportunity: draft.opportunity,
            order_parameters: draft.order_parameters,
            search_parameters: draft.search_parameters,
            status: OrderState::Pending,
            history: vec![StatusRecord {
                status: OrderState::Pending,
                timestamp: now,
                reason: None,
                event: None,
            }],
            backend_ref: None,
            created_at: now,
        }
    }

    /// Append a status record and move the current status with it.
    ///
    /// Timestamps are clamped so the history never goes backwards even if the
    /// wall clock does.
    pub(crate) fn record_transition(
        &mut self,
        to: OrderState,
        event: &str,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) {
        let timestamp = self
            .history
            .last()
            .map_or(at, |last| at.max(last.timestamp));
        self.history.push(StatusRecord {
            status: to,
            timestamp,
            reason,
            event: Some(event.to_string()),
        });
        self.status = to;
    }

    pub(crate) fn set_backend_ref(&mut self, backend_ref: BackendRef) {
        self.backend_ref = Some(backend_ref);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn opportunity(&self) -> &Opportunity {
        &self.opportunity
    }

    pub fn order_parameters(&self) -> &Map<String, Value> {
        &self.order_parameters
    }

    pub fn search_parameters(&self) -> Option<&SearchParameters> {
        self.search_parameters.as_ref()
    }

    pub fn status(&self) -> OrderState {
        self.status
    }

    pub fn history(&self) -> &[StatusRecord] {
        &self.history
    }

    pub fn backend_ref(&self) -> Option<&BackendRef> {
        self.backend_ref.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Optimistic concurrency token: the number of status records.
    pub fn version(&self) -> usize {
        self.history.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One page of orders, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatetimeInterval, Geometry};
    use chrono::{Duration, TimeZone};

    fn draft() -> OrderDraft {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        OrderDraft::new(Opportunity {
            id: "opp-1".to_string(),
            product_id: "test-spotlight".to_string(),
            datetime: DatetimeInterval::new(start, start + Duration::hours(1)),
            geometry: Geometry::Point([0.0, 0.0]),
            properties: Map::new(),
            price: None,
        })
    }

    #[test]
    fn test_new_order_is_pending_with_one_record() {
        let now = Utc::now();
        let order = Order::new_pending(draft(), now);
        assert_eq!(order.status(), OrderState::Pending);
        assert_eq!(order.history().len(), 1);
        assert_eq!(order.history()[0].status, OrderState::Pending);
        assert_eq!(order.created_at(), now);
        assert_eq!(order.product_id(), "test-spotlight");
    }

    #[test]
    fn test_history_timestamps_never_decrease() {
        let now = Utc::now();
        let mut order = Order::new_pending(draft(), now);
        order.record_transition(
            OrderState::Accepted,
            "admission_accepted",
            None,
            now - Duration::seconds(30),
        );
        assert_eq!(order.history()[1].timestamp, now);
        assert_eq!(order.status(), order.history().last().unwrap().status);
        assert_eq!(order.version(), 2);
    }

    #[test]
    fn test_deserialize_checks_status_against_history() {
        let now = Utc::now();
        let mut order = Order::new_pending(draft(), now);
        order.record_transition(OrderState::Accepted, "admission_accepted", None, now);

        let stored = serde_json::to_value(&order).unwrap();
        let loaded: Order = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(loaded, order);

        let mut forged = stored.clone();
        forged["status"] = serde_json::json!("completed");
        let err = serde_json::from_value::<Order>(forged).unwrap_err();
        assert!(err.to_string().contains("does not match"));

        let mut emptied = stored;
        emptied["history"] = serde_json::json!([]);
        assert!(serde_json::from_value::<Order>(emptied).is_err());
    }

    #[test]
    fn test_backend_ref_rejects_blank() {
        assert!(BackendRef::new("  ").is_err());
        let parsed: Result<BackendRef, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
        assert_eq!(BackendRef::new("task-42").unwrap().as_str(), "task-42");
    }
}
