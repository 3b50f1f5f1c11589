use super::builders::{at, candidate};
use chrono::Duration;
use proptest::prelude::*;
use stapi_core::backend::CandidateWindow;
use stapi_core::filter::{ComparisonOp, ContextValue, EvaluationContext, FilterExpr, Literal};
use stapi_core::models::{BackendRef, DatetimeInterval};
use stapi_core::{OrderEvent, OrderState};

pub fn state_strategy() -> impl Strategy<Value = OrderState> {
    prop::sample::select(OrderState::ALL.to_vec())
}

pub fn event_strategy() -> impl Strategy<Value = OrderEvent> {
    prop_oneof![
        Just(OrderEvent::AdmissionAccepted),
        "[a-z ]{1,12}".prop_map(OrderEvent::reject),
        (1u32..1000).prop_map(|n| {
            OrderEvent::DispatchSucceeded(BackendRef::new(format!("task-{n}")).unwrap())
        }),
        Just(OrderEvent::BackendSucceeded),
        "[a-z ]{1,12}".prop_map(OrderEvent::fail),
        Just(OrderEvent::ClientCancel),
    ]
}

fn comparison_op_strategy() -> impl Strategy<Value = ComparisonOp> {
    prop::sample::select(vec![
        ComparisonOp::Eq,
        ComparisonOp::Ne,
        ComparisonOp::Lt,
        ComparisonOp::Lte,
        ComparisonOp::Gt,
        ComparisonOp::Gte,
    ])
}

fn leaf_strategy() -> impl Strategy<Value = FilterExpr> {
    let property = prop::sample::select(vec!["off_nadir", "vehicle_id"]);
    prop_oneof![
        (property.clone(), comparison_op_strategy(), 0i64..50)
            .prop_map(|(p, op, v)| FilterExpr::compare(p, op, v)),
        (property.clone(), 0i64..25, 25i64..50)
            .prop_map(|(p, lo, hi)| FilterExpr::between(p, lo, hi)),
        (property, prop::collection::vec(0i64..10, 1..4))
            .prop_map(|(p, values)| FilterExpr::one_of(p, values)),
    ]
}

/// Arbitrary nested filters over `off_nadir` and `vehicle_id`
pub fn filter_strategy() -> impl Strategy<Value = FilterExpr> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(FilterExpr::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(FilterExpr::Or),
            inner.prop_map(FilterExpr::not),
        ]
    })
}

pub fn context_strategy() -> impl Strategy<Value = EvaluationContext> {
    (prop::option::of(0i64..50), prop::option::of(0i64..10)).prop_map(|(off_nadir, vehicle)| {
        let mut context = EvaluationContext::new();
        if let Some(v) = off_nadir {
            context.insert("off_nadir", ContextValue::Scalar(Literal::Integer(v)));
        }
        if let Some(v) = vehicle {
            context.insert("vehicle_id", ContextValue::Scalar(Literal::Integer(v)));
        }
        context
    })
}

/// Candidate windows with unique ids and frequently colliding start times
pub fn candidates_strategy() -> impl Strategy<Value = Vec<CandidateWindow>> {
    prop::collection::vec((0u32..6, 0i64..46, 1i64..9), 0..20).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (hour, off_nadir, vehicle))| {
                candidate(&format!("cand-{i:02}"), hour * 2, off_nadir, vehicle)
            })
            .collect()
    })
}

pub fn day_window() -> DatetimeInterval {
    DatetimeInterval::new(at(0, 0), at(0, 0) + Duration::days(1))
}
