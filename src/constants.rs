//! # System Constants
//!
//! Event names and default limits shared across the search engine, the order
//! state machine and configuration.

use crate::state_machine::OrderState;

/// Lifecycle events published after each committed order transition
pub mod events {
    pub const ORDER_PENDING: &str = "order.pending";
    pub const ORDER_ACCEPTED: &str = "order.accepted";
    pub const ORDER_REJECTED: &str = "order.rejected";
    pub const ORDER_IN_PROGRESS: &str = "order.in_progress";
    pub const ORDER_COMPLETED: &str = "order.completed";
    pub const ORDER_FAILED: &str = "order.failed";
    pub const ORDER_CANCELLED: &str = "order.cancelled";
}

/// Defaults used when configuration does not say otherwise
pub mod defaults {
    pub const ENVIRONMENT: &str = "development";
    pub const PAGE_LIMIT: usize = 10;
    pub const MAX_PAGE_LIMIT: usize = 100;
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
    pub const LOG_LEVEL: &str = "info";
    pub const CONFIG_DIRECTORY: &str = "config";
}

/// Event name announcing that an order entered `state`
pub fn order_event_name(state: OrderState) -> &'static str {
    match state {
        OrderState::Pending => events::ORDER_PENDING,
        OrderState::Accepted => events::ORDER_ACCEPTED,
        OrderState::Rejected => events::ORDER_REJECTED,
        OrderState::InProgress => events::ORDER_IN_PROGRESS,
        OrderState::Completed => events::ORDER_COMPLETED,
        OrderState::Failed => events::ORDER_FAILED,
        OrderState::Cancelled => events::ORDER_CANCELLED,
    }
}
