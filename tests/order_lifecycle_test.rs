mod common;

use common::builders::*;
use serde_json::json;
use stapi_core::backend::BackendEvent;
use stapi_core::filter::FilterExpr;
use stapi_core::models::{BackendRef, OrderDraft, SearchParameters};
use stapi_core::{Order, OrderEvent, OrderState, StapiError};

#[tokio::test]
async fn test_submit_creates_pending_order() {
    let harness = TestHarness::new();
    let order = harness.submitted().await;

    assert_eq!(order.status(), OrderState::Pending);
    assert_eq!(order.history().len(), 1);
    assert_eq!(order.opportunity().datetime, window(0));
    assert!(order.backend_ref().is_none());
    assert_history_consistent(&order);
}

#[tokio::test]
async fn test_admission_accepted_moves_to_accepted() {
    let harness = TestHarness::new();
    let order = harness.submitted().await;

    let event: OrderEvent = "admission accepted".parse().unwrap();
    let order = harness.system.orders.transition(order.id(), event).await.unwrap();

    assert_eq!(order.status(), OrderState::Accepted);
    assert_eq!(order.history().len(), 2);
    assert_eq!(order.history()[1].event.as_deref(), Some("admission_accepted"));
    assert_history_consistent(&order);
}

#[tokio::test]
async fn test_dispatch_then_backend_success_completes_order() {
    let harness = TestHarness::new();
    let order = harness.accepted().await;

    let backend_ref = harness.system.fulfillment.dispatch(order.id()).await.unwrap();
    let order = harness.system.orders.get_order(order.id()).await.unwrap();
    assert_eq!(order.status(), OrderState::InProgress);
    assert_eq!(order.backend_ref(), Some(&backend_ref));

    let order = harness
        .system
        .fulfillment
        .on_backend_update(order.id(), BackendEvent::new(backend_ref, "success"))
        .await
        .unwrap();
    assert_eq!(order.status(), OrderState::Completed);
    assert_eq!(order.history().len(), 4);
    assert_history_consistent(&order);
}

#[tokio::test]
async fn test_cancel_after_completion_is_invalid() {
    let harness = TestHarness::new();
    let order = harness.in_progress().await;
    let backend_ref = order.backend_ref().cloned().unwrap();
    harness
        .system
        .fulfillment
        .on_backend_update(order.id(), BackendEvent::new(backend_ref, "succeeded"))
        .await
        .unwrap();

    let event: OrderEvent = "client cancels".parse().unwrap();
    let err = harness
        .system
        .orders
        .transition(order.id(), event)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StapiError::InvalidTransition { from: OrderState::Completed, ref event, .. } if event == "client_cancel"
    ));
    assert_eq!(err.order_id(), Some(order.id()));

    let order = harness.system.orders.get_order(order.id()).await.unwrap();
    assert_eq!(order.status(), OrderState::Completed);
}

/// Drive a fresh order into `state` through public operations.
async fn order_in(harness: &TestHarness, state: OrderState) -> Order {
    let orders = &harness.system.orders;
    match state {
        OrderState::Pending => harness.submitted().await,
        OrderState::Accepted => harness.accepted().await,
        OrderState::Rejected => {
            let order = harness.submitted().await;
            orders
                .transition(order.id(), OrderEvent::reject("outside coverage"))
                .await
                .unwrap()
        }
        OrderState::InProgress => harness.in_progress().await,
        OrderState::Completed | OrderState::Failed => {
            let order = harness.in_progress().await;
            let event = if state == OrderState::Completed {
                OrderEvent::BackendSucceeded
            } else {
                OrderEvent::fail("sensor fault")
            };
            orders.transition(order.id(), event).await.unwrap()
        }
        OrderState::Cancelled => {
            let order = harness.submitted().await;
            orders.cancel(order.id()).await.unwrap()
        }
    }
}

fn all_events() -> Vec<OrderEvent> {
    vec![
        OrderEvent::AdmissionAccepted,
        OrderEvent::reject("no capacity"),
        OrderEvent::DispatchSucceeded(BackendRef::new("external-task-1").unwrap()),
        OrderEvent::BackendSucceeded,
        OrderEvent::fail("sensor fault"),
        OrderEvent::ClientCancel,
    ]
}

#[tokio::test]
async fn test_every_state_event_pair_follows_the_table() {
    let harness = TestHarness::new();

    for state in OrderState::ALL {
        for event in all_events() {
            let order = order_in(&harness, state).await;
            let expected = stapi_core::state_machine::determine_target_state(state, &event, false);
            let result = harness.system.orders.transition(order.id(), event.clone()).await;

            match (expected, result) {
                (Some(target), Ok(updated)) => {
                    assert_eq!(updated.status(), target, "{state} --{}-->", event.event_type());
                    assert_eq!(updated.history().len(), order.history().len() + 1);
                    assert_history_consistent(&updated);
                }
                (None, Err(StapiError::InvalidTransition { from, .. })) => {
                    assert_eq!(from, state);
                    let unchanged = harness.system.orders.get_order(order.id()).await.unwrap();
                    assert_eq!(unchanged, order);
                }
                (expected, result) => panic!(
                    "{state} --{}--> expected {expected:?}, got {result:?}",
                    event.event_type()
                ),
            }
        }
    }
}

#[tokio::test]
async fn test_terminal_states_reject_everything() {
    let harness = TestHarness::new();
    for state in OrderState::ALL.into_iter().filter(OrderState::is_terminal) {
        for event in all_events() {
            let order = order_in(&harness, state).await;
            let result = harness.system.orders.transition(order.id(), event).await;
            assert!(result.is_err(), "{state} accepted a transition");
        }
    }
}

#[tokio::test]
async fn test_rejection_needs_reason() {
    let harness = TestHarness::new();
    let order = harness.submitted().await;

    let err = harness
        .system
        .orders
        .transition(order.id(), OrderEvent::reject("  "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
    let order = harness.system.orders.get_order(order.id()).await.unwrap();
    assert_eq!(order.status(), OrderState::Pending);
}

#[tokio::test]
async fn test_submit_validation() {
    let harness = TestHarness::new();
    let orders = &harness.system.orders;

    // Missing required order parameter
    let err = orders
        .submit(OrderDraft::new(opportunity("opp-a", 0)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");

    // Unknown product
    let mut unknown = draft();
    unknown.product_id = "nope".to_string();
    unknown.opportunity.product_id = "nope".to_string();
    assert!(matches!(
        orders.submit(unknown).await,
        Err(StapiError::ProductNotFound { .. })
    ));

    // Inverted opportunity window
    let mut inverted = draft();
    let span = inverted.opportunity.datetime;
    inverted.opportunity.datetime.start = span.end;
    inverted.opportunity.datetime.end = span.start;
    assert_eq!(orders.submit(inverted).await.unwrap_err().kind(), "invalid_request");

    // Unknown order parameter
    let extra = draft().with_parameter("priority_lane", json!("fast"));
    assert_eq!(orders.submit(extra).await.unwrap_err().kind(), "invalid_request");

    // Opportunity outside the filter the client searched with
    let search = SearchParameters {
        datetime: full_day(),
        geometry: area(),
        filter: Some(FilterExpr::lt("off_nadir", 10)),
    };
    let filtered = draft().with_search_parameters(search);
    assert_eq!(orders.submit(filtered).await.unwrap_err().kind(), "invalid_request");

    assert!(orders.list_orders(None, None).await.unwrap().orders.is_empty());
}

#[tokio::test]
async fn test_order_statuses_and_listing() {
    let harness = TestHarness::new();
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(harness.submitted().await.id());
    }
    harness.system.orders.cancel(ids[0]).await.unwrap();

    let statuses = harness.system.orders.order_statuses(ids[0]).await.unwrap();
    let states: Vec<_> = statuses.iter().map(|record| record.status).collect();
    assert_eq!(states, vec![OrderState::Pending, OrderState::Cancelled]);
    assert!(statuses.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let mut seen = Vec::new();
    let mut next = None;
    loop {
        let page = harness
            .system
            .orders
            .list_orders(Some(2), next.as_deref())
            .await
            .unwrap();
        assert!(page.orders.len() <= 2);
        seen.extend(page.orders.iter().map(Order::id));
        match page.next {
            Some(token) => next = Some(token),
            None => break,
        }
    }
    let mut expected = ids.clone();
    expected.sort();
    let mut seen_sorted = seen.clone();
    seen_sorted.sort();
    assert_eq!(seen_sorted, expected);
    assert_eq!(seen.len(), 5);

    assert_eq!(
        harness
            .system
            .orders
            .list_orders(Some(0), None)
            .await
            .unwrap_err()
            .kind(),
        "invalid_request"
    );
    assert_eq!(
        harness
            .system
            .orders
            .list_orders(None, Some("garbage"))
            .await
            .unwrap_err()
            .kind(),
        "invalid_request"
    );
}

#[tokio::test]
async fn test_transitions_are_published() {
    let harness = TestHarness::new();
    let mut events = harness.system.event_publisher.subscribe();

    let order = harness.accepted().await;

    let submitted = events.recv().await.unwrap();
    assert_eq!(submitted.name, "order.pending");
    let accepted = events.recv().await.unwrap();
    assert_eq!(accepted.name, "order.accepted");
    assert_eq!(accepted.context["order_id"], json!(order.id().to_string()));
    assert_eq!(accepted.context["from_state"], json!("pending"));
    assert_eq!(accepted.context["event"], json!("admission_accepted"));
}

#[tokio::test]
async fn test_unknown_order() {
    let harness = TestHarness::new();
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        harness.system.orders.get_order(missing).await,
        Err(StapiError::OrderNotFound { order_id }) if order_id == missing
    ));
    assert!(matches!(
        harness.system.orders.cancel(missing).await,
        Err(StapiError::OrderNotFound { .. })
    ));
}
