use crate::backend::{BackendError, BackendEvent, BackendOutcome, TaskingBackend};
use crate::error::{StapiError, StapiResult};
use crate::logging::{log_error, log_order_operation};
use crate::models::{BackendRef, Order};
use crate::state_machine::{OrderEvent, OrderState, OrderStateMachine};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bridges accepted orders to the tasking backend.
///
/// Nothing here retries. Each failure is returned to the caller with the order
/// left exactly as it was.
pub struct FulfillmentCoordinator {
    state_machine: Arc<OrderStateMachine>,
    backend: Arc<dyn TaskingBackend>,
}

impl FulfillmentCoordinator {
    pub fn new(state_machine: Arc<OrderStateMachine>, backend: Arc<dyn TaskingBackend>) -> Self {
        Self {
            state_machine,
            backend,
        }
    }

    /// Hand an `accepted` order to the backend and move it to `in_progress`.
    ///
    /// If the order changed while the backend call was in flight (typically a
    /// concurrent cancel), the freshly created tasking is cancelled on the
    /// backend and `Conflict` is returned.
    pub async fn dispatch(&self, order_id: Uuid) -> StapiResult<BackendRef> {
        let order = self.state_machine.get_order(order_id).await?;
        if order.status() != OrderState::Accepted {
            return Err(StapiError::InvalidTransition {
                order_id,
                from: order.status(),
                event: "dispatch_succeeded".to_string(),
            });
        }

        let backend_ref = self.backend.dispatch(&order).await.map_err(|e| {
            log_error(
                "fulfillment",
                "dispatch",
                &e.to_string(),
                Some(order_id.to_string().as_str()),
            );
            StapiError::DispatchError {
                order_id,
                reason: e.to_string(),
            }
        })?;

        match self
            .state_machine
            .apply(&order, OrderEvent::DispatchSucceeded(backend_ref.clone()))
            .await
        {
            Ok(_) => {
                info!(
                    order_id = %order_id,
                    backend = %self.backend.name(),
                    %backend_ref,
                    "🚀 FULFILLMENT: Order dispatched"
                );
                Ok(backend_ref)
            }
            Err(e) => {
                warn!(
                    order_id = %order_id,
                    %backend_ref,
                    error = %e,
                    "Order changed during dispatch, cancelling orphaned tasking"
                );
                if let Err(cancel_error) = self.backend.cancel(&backend_ref).await {
                    log_error(
                        "fulfillment",
                        "cancel_orphaned_tasking",
                        &cancel_error.to_string(),
                        Some(backend_ref.as_str()),
                    );
                }
                Err(e)
            }
        }
    }

    /// Apply a backend-reported outcome to the order it belongs to.
    ///
    /// Progress is acknowledged without a new status record. A backend
    /// `cancelled` is acknowledged when the order is already cancelled and
    /// otherwise recorded as a failure, since the client did not ask for it.
    pub async fn on_backend_update(&self, order_id: Uuid, event: BackendEvent) -> StapiResult<Order> {
        let order = self.state_machine.get_order(order_id).await?;

        if order.backend_ref() != Some(&event.backend_ref) {
            return Err(StapiError::UnrecognizedBackendEvent {
                order_id,
                detail: format!(
                    "event for backend reference {} but the order has {}",
                    event.backend_ref,
                    order
                        .backend_ref()
                        .map_or_else(|| "none".to_string(), ToString::to_string)
                ),
            });
        }
        let outcome = event
            .outcome()
            .ok_or_else(|| StapiError::UnrecognizedBackendEvent {
                order_id,
                detail: format!("unknown event kind '{}'", event.kind),
            })?;

        log_order_operation(
            "backend_update",
            Some(order_id),
            Some(order.product_id()),
            None,
            order.status(),
            Some(event.kind.as_str()),
        );

        match outcome {
            BackendOutcome::Progress if order.status() == OrderState::InProgress => {
                debug!(order_id = %order_id, message = ?event.message, "Backend progress");
                Ok(order)
            }
            BackendOutcome::Progress => Err(StapiError::InvalidTransition {
                order_id,
                from: order.status(),
                event: "backend_progress".to_string(),
            }),
            BackendOutcome::Succeeded => {
                self.state_machine
                    .apply(&order, OrderEvent::BackendSucceeded)
                    .await
            }
            BackendOutcome::Failed { reason } => {
                self.state_machine
                    .apply(&order, OrderEvent::BackendFailed(reason))
                    .await
            }
            BackendOutcome::Cancelled if order.status() == OrderState::Cancelled => Ok(order),
            BackendOutcome::Cancelled => {
                self.state_machine
                    .apply(&order, OrderEvent::fail("tasking cancelled by backend"))
                    .await
            }
        }
    }

    /// Pull the current backend status for a dispatched order and apply it.
    pub async fn poll(&self, order_id: Uuid) -> StapiResult<Order> {
        let order = self.state_machine.get_order(order_id).await?;
        let backend_ref = order.backend_ref().cloned().ok_or_else(|| {
            StapiError::invalid_request(
                Some(order.product_id()),
                format!("order {order_id} has not been dispatched"),
            )
        })?;

        let event = self
            .backend
            .status(&backend_ref)
            .await
            .map_err(|e| backend_call_error(&order, e))?;
        self.on_backend_update(order_id, event).await
    }

    /// Cancel an order, asking the backend to stop tasking first when the
    /// order is already `in_progress`.
    pub async fn cancel(&self, order_id: Uuid) -> StapiResult<Order> {
        let order = self.state_machine.get_order(order_id).await?;

        if order.status() == OrderState::InProgress {
            if !self.state_machine.capabilities().supports_mid_flight_cancel {
                return Err(StapiError::InvalidTransition {
                    order_id,
                    from: order.status(),
                    event: OrderEvent::ClientCancel.event_type().to_string(),
                });
            }
            if let Some(backend_ref) = order.backend_ref() {
                self.backend
                    .cancel(backend_ref)
                    .await
                    .map_err(|e| backend_call_error(&order, e))?;
            }
            return self.state_machine.apply_backend_cancelled(&order).await;
        }

        self.state_machine.apply(&order, OrderEvent::ClientCancel).await
    }
}

fn backend_call_error(order: &Order, error: BackendError) -> StapiError {
    match error {
        BackendError::Unavailable { .. } => StapiError::BackendUnavailable {
            product_id: Some(order.product_id().to_string()),
            reason: error.to_string(),
        },
        BackendError::Rejected { .. } => {
            StapiError::invalid_request(Some(order.product_id()), error.to_string())
        }
        BackendError::NotFound { .. } | BackendError::Internal(_) => {
            StapiError::Internal(format!("order {}: {error}", order.id()))
        }
    }
}
