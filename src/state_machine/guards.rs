use super::errors::{GuardError, GuardResult};
use super::events::OrderEvent;
use crate::models::Order;

/// Trait for implementing state transition guards
pub trait StateGuard<T>: Send + Sync {
    /// Check if the event may be applied to the entity
    fn check(&self, entity: &T, event: &OrderEvent) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard against a second dispatch overwriting the backend reference
pub struct DispatchRefGuard;

impl StateGuard<Order> for DispatchRefGuard {
    fn check(&self, order: &Order, event: &OrderEvent) -> GuardResult<()> {
        if let (OrderEvent::DispatchSucceeded(_), Some(existing)) = (event, order.backend_ref()) {
            return Err(GuardError::BackendRefAlreadySet {
                order_id: order.id(),
                backend_ref: existing.to_string(),
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Dispatch must not replace an existing backend reference"
    }
}

/// Guard requiring rejections and failures to explain themselves
pub struct ReasonRequiredGuard;

impl StateGuard<Order> for ReasonRequiredGuard {
    fn check(&self, _order: &Order, event: &OrderEvent) -> GuardResult<()> {
        match event.reason() {
            Some(reason) if reason.trim().is_empty() => Err(GuardError::ReasonRequired {
                event: event.event_type().to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn description(&self) -> &'static str {
        "Rejections and failures must carry a reason"
    }
}

/// Guards applied to every order transition, in order
pub fn order_guards() -> [&'static dyn StateGuard<Order>; 2] {
    [&DispatchRefGuard, &ReasonRequiredGuard]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackendRef, DatetimeInterval, Geometry, Opportunity, OrderDraft};
    use crate::state_machine::OrderState;
    use chrono::{Duration, TimeZone, Utc};

    fn order() -> Order {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let draft = OrderDraft::new(Opportunity {
            id: "opp-1".to_string(),
            product_id: "test-spotlight".to_string(),
            datetime: DatetimeInterval::new(start, start + Duration::hours(1)),
            geometry: Geometry::Point([0.0, 0.0]),
            properties: Default::default(),
            price: None,
        });
        Order::new_pending(draft, start)
    }

    #[test]
    fn test_guard_descriptions() {
        assert_eq!(
            DispatchRefGuard.description(),
            "Dispatch must not replace an existing backend reference"
        );
        assert_eq!(
            ReasonRequiredGuard.description(),
            "Rejections and failures must carry a reason"
        );
    }

    #[test]
    fn test_dispatch_ref_guard() {
        let mut order = order();
        let event = OrderEvent::DispatchSucceeded(BackendRef::new("task-2").unwrap());
        assert!(DispatchRefGuard.check(&order, &event).is_ok());

        order.set_backend_ref(BackendRef::new("task-1").unwrap());
        assert!(matches!(
            DispatchRefGuard.check(&order, &event),
            Err(GuardError::BackendRefAlreadySet { .. })
        ));
    }

    #[test]
    fn test_reason_required_guard() {
        let order = order();
        assert_eq!(order.status(), OrderState::Pending);
        assert!(ReasonRequiredGuard
            .check(&order, &OrderEvent::reject("outside coverage"))
            .is_ok());
        assert_eq!(
            ReasonRequiredGuard.check(&order, &OrderEvent::reject("  ")),
            Err(GuardError::ReasonRequired {
                event: "admission_rejected".to_string()
            })
        );
        assert!(ReasonRequiredGuard
            .check(&order, &OrderEvent::AdmissionAccepted)
            .is_ok());
    }
}
