//! Deterministic evaluation of filter expressions.
//!
//! Missing or incomparable context values make the enclosing comparison false
//! instead of raising an error, which keeps `and`/`or` short-circuiting total.

use super::expression::{ComparisonOp, FilterExpr, Literal};
use crate::models::{DatetimeInterval, Geometry, Opportunity};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A concrete value a filter can be evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Scalar(Literal),
    /// Matches when any element matches.
    List(Vec<ContextValue>),
    /// Numeric range such as `{"minimum": 20, "maximum": 22}`.
    Range { minimum: f64, maximum: f64 },
    Geometry(Geometry),
    Interval(DatetimeInterval),
}

impl ContextValue {
    /// Convert an opportunity property. Returns `None` for nulls and for
    /// objects that are neither ranges nor geometries.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Scalar(Literal::Bool(*b))),
            Value::Number(n) => n
                .as_i64()
                .map(Literal::Integer)
                .or_else(|| n.as_f64().map(Literal::Number))
                .map(Self::Scalar),
            Value::String(s) => Some(Self::Scalar(Literal::Text(s.clone()))),
            Value::Array(items) => Some(Self::List(items.iter().filter_map(Self::from_json).collect())),
            Value::Object(object) => {
                let bound = |key: &str| object.get(key).and_then(Value::as_f64);
                if let (Some(minimum), Some(maximum)) = (bound("minimum"), bound("maximum")) {
                    return Some(Self::Range { minimum, maximum });
                }
                if object.contains_key("type") && object.contains_key("coordinates") {
                    return serde_json::from_value::<Geometry>(value.clone())
                        .ok()
                        .map(Self::Geometry);
                }
                None
            }
        }
    }
}

/// Named values an expression is evaluated against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    values: BTreeMap<String, ContextValue>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ContextValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ContextValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.values.get(name)
    }

    /// Every property of the opportunity, plus `datetime`, `geometry`,
    /// `product_id` and, when priced and not shadowed by a property, `price`.
    pub fn from_opportunity(opportunity: &Opportunity) -> Self {
        let mut context = Self::new();
        for (name, value) in &opportunity.properties {
            if let Some(converted) = ContextValue::from_json(value) {
                context.insert(name.clone(), converted);
            }
        }
        if let Some(price) = &opportunity.price {
            context
                .values
                .entry("price".to_string())
                .or_insert_with(|| {
                    ContextValue::Scalar(Literal::Integer(
                        i64::try_from(price.amount_minor).unwrap_or(i64::MAX),
                    ))
                });
        }
        context.insert("datetime", ContextValue::Interval(opportunity.datetime));
        context.insert("geometry", ContextValue::Geometry(opportunity.geometry.clone()));
        context.insert(
            "product_id",
            ContextValue::Scalar(Literal::Text(opportunity.product_id.clone())),
        );
        context
    }
}

pub fn evaluate(expr: &FilterExpr, context: &EvaluationContext) -> bool {
    match expr {
        FilterExpr::Comparison {
            property,
            op,
            value,
        } => context
            .get(property)
            .is_some_and(|cv| compare(cv, *op, value)),
        FilterExpr::Between {
            property,
            lower,
            upper,
        } => context
            .get(property)
            .is_some_and(|cv| between(cv, lower, upper)),
        FilterExpr::In { property, values } => context.get(property).is_some_and(|cv| {
            values
                .iter()
                .any(|value| compare(cv, ComparisonOp::Eq, value))
        }),
        FilterExpr::Intersects { property, geometry } => context
            .get(property)
            .is_some_and(|cv| intersects(cv, geometry)),
        FilterExpr::Overlaps { property, interval } => context
            .get(property)
            .is_some_and(|cv| overlaps(cv, interval)),
        FilterExpr::And(operands) => operands.iter().all(|e| evaluate(e, context)),
        FilterExpr::Or(operands) => operands.iter().any(|e| evaluate(e, context)),
        FilterExpr::Not(operand) => !evaluate(operand, context),
    }
}

fn compare(cv: &ContextValue, op: ComparisonOp, literal: &Literal) -> bool {
    match cv {
        ContextValue::Scalar(scalar) => {
            compare_scalars(scalar, literal).is_some_and(|ordering| op.matches(ordering))
        }
        ContextValue::List(items) => items.iter().any(|item| compare(item, op, literal)),
        ContextValue::Range { minimum, maximum } => {
            let Some(x) = literal.as_f64() else {
                return false;
            };
            let within = *minimum <= x && x <= *maximum;
            match op {
                ComparisonOp::Eq => within,
                ComparisonOp::Ne => !within,
                ComparisonOp::Lt => *maximum < x,
                ComparisonOp::Lte => *maximum <= x,
                ComparisonOp::Gt => *minimum > x,
                ComparisonOp::Gte => *minimum >= x,
            }
        }
        ContextValue::Interval(interval) => {
            let Literal::Timestamp(t) = literal else {
                return false;
            };
            compare_interval(interval, op, *t)
        }
        ContextValue::Geometry(_) => false,
    }
}

/// An interval is `<` an instant when it ends before it, `>` when it starts after it.
fn compare_interval(interval: &DatetimeInterval, op: ComparisonOp, t: DateTime<Utc>) -> bool {
    match op {
        ComparisonOp::Eq => interval.contains(t),
        ComparisonOp::Ne => !interval.contains(t),
        ComparisonOp::Lt => interval.end < t,
        ComparisonOp::Lte => interval.end <= t,
        ComparisonOp::Gt => interval.start > t,
        ComparisonOp::Gte => interval.start >= t,
    }
}

fn compare_scalars(left: &Literal, right: &Literal) -> Option<Ordering> {
    match (left, right) {
        (Literal::Integer(a), Literal::Integer(b)) => Some(a.cmp(b)),
        (Literal::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
        (Literal::Text(a), Literal::Text(b)) => Some(a.cmp(b)),
        (Literal::Timestamp(a), Literal::Timestamp(b)) => Some(a.cmp(b)),
        (Literal::Text(a), Literal::Timestamp(b)) => parse_timestamp(a).map(|a| a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

fn between(cv: &ContextValue, lower: &Literal, upper: &Literal) -> bool {
    match cv {
        ContextValue::Scalar(_) => {
            compare(cv, ComparisonOp::Gte, lower) && compare(cv, ComparisonOp::Lte, upper)
        }
        ContextValue::List(items) => items.iter().any(|item| between(item, lower, upper)),
        ContextValue::Range { minimum, maximum } => match (lower.as_f64(), upper.as_f64()) {
            (Some(lo), Some(hi)) => *minimum <= hi && lo <= *maximum,
            _ => false,
        },
        ContextValue::Interval(interval) => match (lower, upper) {
            (Literal::Timestamp(lo), Literal::Timestamp(hi)) => {
                interval.overlaps(&DatetimeInterval::new(*lo, *hi))
            }
            _ => false,
        },
        ContextValue::Geometry(_) => false,
    }
}

fn intersects(cv: &ContextValue, geometry: &Geometry) -> bool {
    match cv {
        ContextValue::Geometry(own) => own.intersects(geometry),
        ContextValue::List(items) => items.iter().any(|item| intersects(item, geometry)),
        _ => false,
    }
}

fn overlaps(cv: &ContextValue, interval: &DatetimeInterval) -> bool {
    match cv {
        ContextValue::Interval(own) => own.overlaps(interval),
        ContextValue::Scalar(Literal::Timestamp(t)) => interval.contains(*t),
        ContextValue::Scalar(Literal::Text(raw)) => match raw.parse::<DatetimeInterval>() {
            Ok(own) => own.overlaps(interval),
            Err(_) => parse_timestamp(raw).is_some_and(|t| interval.contains(t)),
        },
        ContextValue::List(items) => items.iter().any(|item| overlaps(item, interval)),
        _ => false,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn opportunity() -> Opportunity {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Opportunity {
            id: "opp-1".to_string(),
            product_id: "test-spotlight".to_string(),
            datetime: DatetimeInterval::new(start, start + Duration::hours(1)),
            geometry: Geometry::Point([0.0, 0.0]),
            properties: json!({
                "off_nadir": {"minimum": 20, "maximum": 22},
                "vehicle_id": [1],
                "platform": "platform_id",
                "gsd": 0.5
            })
            .as_object()
            .cloned()
            .unwrap(),
            price: None,
        }
    }

    #[test]
    fn test_scalar_comparisons() {
        let ctx = EvaluationContext::from_opportunity(&opportunity());
        assert!(evaluate(&FilterExpr::eq("platform", "platform_id"), &ctx));
        assert!(evaluate(&FilterExpr::lte("gsd", 1), &ctx));
        assert!(!evaluate(&FilterExpr::gt("gsd", 1), &ctx));
        assert!(evaluate(&FilterExpr::eq("product_id", "test-spotlight"), &ctx));
    }

    #[test]
    fn test_range_and_list_properties() {
        let ctx = EvaluationContext::from_opportunity(&opportunity());
        assert!(evaluate(&FilterExpr::eq("off_nadir", 21), &ctx));
        assert!(evaluate(&FilterExpr::lte("off_nadir", 30), &ctx));
        assert!(!evaluate(&FilterExpr::lte("off_nadir", 21), &ctx));
        assert!(evaluate(&FilterExpr::between("off_nadir", 0, 20), &ctx));
        assert!(evaluate(&FilterExpr::one_of("vehicle_id", [1, 2]), &ctx));
        assert!(!evaluate(&FilterExpr::one_of("vehicle_id", [5]), &ctx));
    }

    #[test]
    fn test_missing_field_is_false_not_error() {
        let ctx = EvaluationContext::from_opportunity(&opportunity());
        let missing = FilterExpr::lte("cloud_cover", 20);
        assert!(!evaluate(&missing, &ctx));
        assert!(evaluate(&FilterExpr::not(missing.clone()), &ctx));
        assert!(evaluate(
            &FilterExpr::or([missing, FilterExpr::eq("platform", "platform_id")]),
            &ctx
        ));
    }

    #[test]
    fn test_spatial_and_temporal() {
        let ctx = EvaluationContext::from_opportunity(&opportunity());
        assert!(evaluate(
            &FilterExpr::intersects("geometry", Geometry::bbox(-1.0, -1.0, 1.0, 1.0)),
            &ctx
        ));
        assert!(!evaluate(
            &FilterExpr::intersects("geometry", Geometry::bbox(5.0, 5.0, 6.0, 6.0)),
            &ctx
        ));

        let later = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert!(!evaluate(
            &FilterExpr::overlaps(
                "datetime",
                DatetimeInterval::new(later, later + Duration::hours(1))
            ),
            &ctx
        ));
        assert!(evaluate(&FilterExpr::lt("datetime", later), &ctx));
    }

    #[test]
    fn test_incomparable_types_are_false() {
        let ctx = EvaluationContext::new().with("platform", ContextValue::Scalar("a".into()));
        assert!(!evaluate(&FilterExpr::eq("platform", 1), &ctx));
        assert!(!evaluate(&FilterExpr::compare("platform", ComparisonOp::Ne, 1), &ctx));
    }
}
