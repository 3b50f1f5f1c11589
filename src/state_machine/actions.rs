use super::errors::{ActionError, ActionResult};
use super::states::OrderState;
use crate::constants::order_event_name;
use crate::events::publisher::EventPublisher;
use crate::logging::log_order_operation;
use crate::models::Order;
use async_trait::async_trait;
use serde_json::Value;

/// Trait for implementing post-transition actions
#[async_trait]
pub trait StateAction<T>: Send + Sync {
    /// Execute the action. `from_state` is `None` for the creation record.
    async fn execute(
        &self,
        entity: &T,
        from_state: Option<OrderState>,
        to_state: OrderState,
        event: &str,
    ) -> ActionResult<()>;

    /// Get a description of this action for logging
    fn description(&self) -> &'static str;
}

/// Action to publish lifecycle events when state transitions occur
pub struct PublishTransitionEventAction {
    event_publisher: EventPublisher,
}

impl PublishTransitionEventAction {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self { event_publisher }
    }
}

#[async_trait]
impl StateAction<Order> for PublishTransitionEventAction {
    async fn execute(
        &self,
        order: &Order,
        from_state: Option<OrderState>,
        to_state: OrderState,
        event: &str,
    ) -> ActionResult<()> {
        let event_name = order_event_name(to_state);
        let context = build_order_event_context(order, from_state, to_state, event);

        self.event_publisher
            .publish(event_name, context)
            .await
            .map_err(|_| ActionError::EventPublishFailed {
                event_name: event_name.to_string(),
            })
    }

    fn description(&self) -> &'static str {
        "Publish lifecycle event for order transition"
    }
}

/// Action to record the transition in the structured log
pub struct LogTransitionAction;

#[async_trait]
impl StateAction<Order> for LogTransitionAction {
    async fn execute(
        &self,
        order: &Order,
        from_state: Option<OrderState>,
        to_state: OrderState,
        event: &str,
    ) -> ActionResult<()> {
        let reason = order.history().last().and_then(|r| r.reason.as_deref());
        log_order_operation(
            event,
            Some(order.id()),
            Some(order.product_id()),
            from_state,
            to_state,
            reason,
        );
        if matches!(to_state, OrderState::Failed | OrderState::Rejected) {
            tracing::warn!(
                order_id = %order.id(),
                status = %to_state,
                reason = reason,
                "Order ended unsuccessfully"
            );
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Log order transition"
    }
}

fn build_order_event_context(
    order: &Order,
    from_state: Option<OrderState>,
    to_state: OrderState,
    event: &str,
) -> Value {
    let record = order.history().last();
    serde_json::json!({
        "order_id": order.id(),
        "product_id": order.product_id(),
        "opportunity_id": order.opportunity().id,
        "from_state": from_state,
        "to_state": to_state,
        "event": event,
        "reason": record.and_then(|r| r.reason.clone()),
        "backend_ref": order.backend_ref(),
        "version": order.version(),
        "transitioned_at": record.map(|r| r.timestamp),
    })
}
