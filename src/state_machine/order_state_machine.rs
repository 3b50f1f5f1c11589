use super::{
    actions::{LogTransitionAction, PublishTransitionEventAction, StateAction},
    events::OrderEvent,
    guards::order_guards,
    persistence::{OrderStore, TransitionChange},
    states::OrderState,
};
use crate::backend::BackendCapabilities;
use crate::catalog::Catalog;
use crate::config::PaginationConfig;
use crate::error::{StapiError, StapiResult};
use crate::events::publisher::EventPublisher;
use crate::filter::{self, EvaluationContext};
use crate::models::{Order, OrderDraft, OrderPage, PageCursor, Product, StatusRecord};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// The transition table. `None` means the pair is not allowed.
///
/// `in_progress --client_cancel--> cancelled` exists only when the backend
/// supports mid-flight cancellation.
pub fn determine_target_state(
    current_state: OrderState,
    event: &OrderEvent,
    mid_flight_cancel: bool,
) -> Option<OrderState> {
    let target = match (current_state, event) {
        // Admission
        (OrderState::Pending, OrderEvent::AdmissionAccepted) => OrderState::Accepted,
        (OrderState::Pending, OrderEvent::AdmissionRejected(_)) => OrderState::Rejected,

        // Dispatch
        (OrderState::Accepted, OrderEvent::DispatchSucceeded(_)) => OrderState::InProgress,

        // Backend outcomes
        (OrderState::InProgress, OrderEvent::BackendSucceeded) => OrderState::Completed,
        (OrderState::InProgress, OrderEvent::BackendFailed(_)) => OrderState::Failed,

        // Cancellation
        (OrderState::Pending | OrderState::Accepted, OrderEvent::ClientCancel) => {
            OrderState::Cancelled
        }
        (OrderState::InProgress, OrderEvent::ClientCancel) if mid_flight_cancel => {
            OrderState::Cancelled
        }

        _ => return None,
    };
    Some(target)
}

/// Order lifecycle management over an injected catalog and order store.
///
/// Every change goes through [`OrderStore::append_transition`], a
/// compare-and-append on the order's status and version, so two concurrent
/// transitions from the same state never both succeed: the loser gets
/// [`StapiError::Conflict`].
pub struct OrderStateMachine {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn OrderStore>,
    event_publisher: EventPublisher,
    capabilities: BackendCapabilities,
    pagination: PaginationConfig,
}

impl OrderStateMachine {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn OrderStore>,
        event_publisher: EventPublisher,
        capabilities: BackendCapabilities,
    ) -> Self {
        Self {
            catalog,
            store,
            event_publisher,
            capabilities,
            pagination: PaginationConfig::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    /// Validate a draft and create the order in `pending`.
    pub async fn submit(&self, draft: OrderDraft) -> StapiResult<Order> {
        let product = self.catalog.get_product(&draft.product_id).await?;
        validate_draft(&product, &draft)?;

        let order = Order::new_pending(draft, Utc::now());
        self.store
            .insert(order.clone())
            .await
            .map_err(|e| e.into_stapi_error("submit"))?;

        self.execute_actions(&order, None, OrderState::Pending, "submit")
            .await;
        Ok(order)
    }

    /// Re-read the order and apply one table move.
    pub async fn transition(&self, order_id: Uuid, event: OrderEvent) -> StapiResult<Order> {
        let order = self.get_order(order_id).await?;
        self.apply(&order, event).await
    }

    /// Apply one table move to `order` as it was read.
    ///
    /// The move only commits if the stored order is still at the same status
    /// and version as `order`; otherwise it fails with `Conflict`. Callers that
    /// hold a snapshot across an await (dispatch) rely on this.
    ///
    /// Cancelling an `in_progress` order is refused here because the backend
    /// has to be told first; use [`crate::fulfillment::FulfillmentCoordinator::cancel`].
    pub async fn apply(&self, order: &Order, event: OrderEvent) -> StapiResult<Order> {
        self.apply_move(order, event, false).await
    }

    /// Apply a mid-flight cancel after the backend has stopped tasking.
    pub(crate) async fn apply_backend_cancelled(&self, order: &Order) -> StapiResult<Order> {
        self.apply_move(
            order,
            OrderEvent::ClientCancel,
            self.capabilities.supports_mid_flight_cancel,
        )
        .await
    }

    async fn apply_move(
        &self,
        order: &Order,
        event: OrderEvent,
        mid_flight_cancel: bool,
    ) -> StapiResult<Order> {
        let from_state = order.status();
        let event_type = event.event_type();

        let target_state = determine_target_state(from_state, &event, mid_flight_cancel)
            .ok_or_else(|| StapiError::InvalidTransition {
                order_id: order.id(),
                from: from_state,
                event: event_type.to_string(),
            })?;

        for guard in order_guards() {
            guard.check(order, &event).map_err(|e| {
                debug!(
                    order_id = %order.id(),
                    guard = guard.description(),
                    "Transition guard refused"
                );
                StapiError::invalid_request(Some(order.product_id()), e.to_string())
            })?;
        }

        let change = TransitionChange {
            to: target_state,
            event: event_type.to_string(),
            reason: event.reason().map(str::to_string),
            backend_ref: event.backend_ref().cloned(),
            at: Utc::now(),
        };
        let updated = self
            .store
            .append_transition(order.id(), from_state, order.version(), change)
            .await
            .map_err(|e| e.into_stapi_error(event_type))?;

        self.execute_actions(&updated, Some(from_state), target_state, event_type)
            .await;
        Ok(updated)
    }

    /// Cancel on behalf of the client. Allowed from `pending` and `accepted`;
    /// `in_progress` orders go through the fulfillment coordinator.
    pub async fn cancel(&self, order_id: Uuid) -> StapiResult<Order> {
        self.transition(order_id, OrderEvent::ClientCancel).await
    }

    pub async fn get_order(&self, order_id: Uuid) -> StapiResult<Order> {
        self.store
            .get(order_id)
            .await
            .map_err(|e| e.into_stapi_error("get_order"))?
            .ok_or(StapiError::OrderNotFound { order_id })
    }

    /// Orders oldest first, `limit` per page.
    pub async fn list_orders(
        &self,
        limit: Option<usize>,
        next: Option<&str>,
    ) -> StapiResult<OrderPage> {
        let limit = self
            .pagination
            .resolve(limit)
            .map_err(|reason| StapiError::invalid_request(None, reason))?;
        let cursor = next
            .map(PageCursor::decode)
            .transpose()
            .map_err(|e| StapiError::invalid_request(None, e.to_string()))?;

        // One extra row tells us whether another page exists
        let mut orders = self
            .store
            .list(cursor.as_ref(), limit + 1)
            .await
            .map_err(|e| e.into_stapi_error("list_orders"))?;
        let next = if orders.len() > limit {
            orders.truncate(limit);
            orders
                .last()
                .map(|last| PageCursor::new(last.created_at(), last.id().to_string()).encode())
        } else {
            None
        };
        Ok(OrderPage { orders, next })
    }

    /// Full status history, oldest first.
    pub async fn order_statuses(&self, order_id: Uuid) -> StapiResult<Vec<StatusRecord>> {
        Ok(self.get_order(order_id).await?.history().to_vec())
    }

    /// Run post-transition actions. The transition is already committed, so
    /// failures are logged rather than returned.
    async fn execute_actions(
        &self,
        order: &Order,
        from_state: Option<OrderState>,
        to_state: OrderState,
        event: &str,
    ) {
        let actions: [Box<dyn StateAction<Order>>; 2] = [
            Box::new(LogTransitionAction),
            Box::new(PublishTransitionEventAction::new(
                self.event_publisher.clone(),
            )),
        ];

        for action in actions {
            if let Err(e) = action.execute(order, from_state, to_state, event).await {
                warn!(
                    order_id = %order.id(),
                    action = action.description(),
                    error = %e,
                    "Post-transition action failed"
                );
            }
        }
    }
}

/// Admission-time validation of a draft against its product.
fn validate_draft(product: &Product, draft: &OrderDraft) -> StapiResult<()> {
    let invalid = |reason: String| StapiError::invalid_request(Some(&product.id), reason);
    let opportunity = &draft.opportunity;

    if opportunity.product_id != product.id {
        return Err(invalid(format!(
            "opportunity {} belongs to product {}",
            opportunity.id, opportunity.product_id
        )));
    }
    if !opportunity.datetime.is_valid() {
        return Err(invalid(format!(
            "opportunity window {} starts after it ends",
            opportunity.datetime
        )));
    }
    opportunity
        .geometry
        .validate()
        .map_err(|e| invalid(format!("opportunity geometry is invalid: {e}")))?;

    product
        .order_parameters
        .check_values(&draft.order_parameters)
        .map_err(|violations| invalid(format!("order parameters: {}", violations.join("; "))))?;

    if let Some(search) = &draft.search_parameters {
        search
            .geometry
            .validate()
            .map_err(|e| invalid(format!("search geometry is invalid: {e}")))?;
        if let Some(expr) = &search.filter {
            filter::validate(expr, &product.constraints)
                .map_err(|e| invalid(format!("search filter: {e}")))?;
            if !filter::evaluate(expr, &EvaluationContext::from_opportunity(opportunity)) {
                return Err(invalid(format!(
                    "opportunity {} does not satisfy the search filter",
                    opportunity.id
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendRef;

    fn sample_events() -> Vec<OrderEvent> {
        vec![
            OrderEvent::AdmissionAccepted,
            OrderEvent::reject("outside coverage"),
            OrderEvent::DispatchSucceeded(BackendRef::new("task-1").unwrap()),
            OrderEvent::BackendSucceeded,
            OrderEvent::fail("sensor fault"),
            OrderEvent::ClientCancel,
        ]
    }

    #[test]
    fn test_table_rows() {
        use OrderState::*;
        let expected = [
            (Pending, "admission_accepted", Accepted),
            (Pending, "admission_rejected", Rejected),
            (Pending, "client_cancel", Cancelled),
            (Accepted, "dispatch_succeeded", InProgress),
            (Accepted, "client_cancel", Cancelled),
            (InProgress, "backend_succeeded", Completed),
            (InProgress, "backend_failed", Failed),
        ];

        let mut allowed = Vec::new();
        for state in OrderState::ALL {
            for event in sample_events() {
                if let Some(target) = determine_target_state(state, &event, false) {
                    allowed.push((state, event.event_type(), target));
                }
            }
        }
        assert_eq!(allowed.len(), expected.len());
        for row in expected {
            assert!(allowed.contains(&row), "missing {row:?}");
        }
    }

    #[test]
    fn test_mid_flight_cancel_needs_capability() {
        assert_eq!(
            determine_target_state(OrderState::InProgress, &OrderEvent::ClientCancel, false),
            None
        );
        assert_eq!(
            determine_target_state(OrderState::InProgress, &OrderEvent::ClientCancel, true),
            Some(OrderState::Cancelled)
        );
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        for state in OrderState::ALL.into_iter().filter(OrderState::is_terminal) {
            for event in sample_events() {
                assert_eq!(determine_target_state(state, &event, true), None);
            }
        }
    }
}
