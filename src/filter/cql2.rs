//! # CQL2-JSON
//!
//! Conversion between [`FilterExpr`] and the CQL2-JSON encoding STAPI clients
//! send in the `filter` member of search and order bodies:
//!
//! ```json
//! {"op": "and", "args": [
//!     {"op": "<=", "args": [{"property": "off_nadir"}, 30]},
//!     {"op": "s_intersects", "args": [{"property": "geometry"},
//!                                     {"type": "Point", "coordinates": [0, 0]}]}
//! ]}
//! ```
//!
//! Supported operators: `and`, `or`, `not`, `=`, `<>`, `<`, `<=`, `>`, `>=`,
//! `between`, `in`, `s_intersects`, `t_intersects` (alias `anyinteracts`).
//! Timestamps use `{"timestamp": "..."}`, intervals `{"interval": [start, end]}`.

use super::expression::{ComparisonOp, FilterExpr, Literal};
use super::validate::SchemaError;
use crate::models::{DatetimeInterval, Geometry};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

impl FilterExpr {
    pub fn from_cql2_json(value: &Value) -> Result<Self, SchemaError> {
        let object = value
            .as_object()
            .ok_or_else(|| malformed(format!("expected an object, got {value}")))?;
        let op = object
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing 'op'"))?;
        let args = object
            .get("args")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed(format!("'{op}' is missing its 'args' array")))?;

        match op.to_ascii_lowercase().as_str() {
            "and" => Ok(FilterExpr::And(parse_operands(args)?)),
            "or" => Ok(FilterExpr::Or(parse_operands(args)?)),
            "not" => match args.as_slice() {
                [operand] => Ok(FilterExpr::not(FilterExpr::from_cql2_json(operand)?)),
                _ => Err(malformed("'not' takes exactly one argument")),
            },
            "between" => match args.as_slice() {
                [property, lower, upper] => Ok(FilterExpr::Between {
                    property: property_name(property)?,
                    lower: literal(lower)?,
                    upper: literal(upper)?,
                }),
                _ => Err(malformed("'between' takes a property and two bounds")),
            },
            "in" => match args.as_slice() {
                [property, Value::Array(values)] => Ok(FilterExpr::In {
                    property: property_name(property)?,
                    values: values.iter().map(literal).collect::<Result<_, _>>()?,
                }),
                _ => Err(malformed("'in' takes a property and an array of values")),
            },
            "s_intersects" => match args.as_slice() {
                [property, geometry] => Ok(FilterExpr::Intersects {
                    property: property_name(property)?,
                    geometry: serde_json::from_value::<Geometry>(geometry.clone())
                        .map_err(|e| malformed(format!("invalid geometry: {e}")))?,
                }),
                _ => Err(malformed("'s_intersects' takes a property and a geometry")),
            },
            "t_intersects" | "anyinteracts" => match args.as_slice() {
                [property, interval_value] => Ok(FilterExpr::Overlaps {
                    property: property_name(property)?,
                    interval: interval(interval_value)?,
                }),
                _ => Err(malformed(format!("'{op}' takes a property and an interval"))),
            },
            other => {
                let op = ComparisonOp::from_symbol(other)
                    .ok_or_else(|| malformed(format!("unsupported operator '{other}'")))?;
                comparison(op, args)
            }
        }
    }

    pub fn to_cql2_json(&self) -> Value {
        match self {
            FilterExpr::Comparison {
                property,
                op,
                value,
            } => json!({"op": op.symbol(), "args": [prop(property), literal_json(value)]}),
            FilterExpr::Between {
                property,
                lower,
                upper,
            } => json!({
                "op": "between",
                "args": [prop(property), literal_json(lower), literal_json(upper)]
            }),
            FilterExpr::In { property, values } => json!({
                "op": "in",
                "args": [prop(property), values.iter().map(literal_json).collect::<Vec<_>>()]
            }),
            FilterExpr::Intersects { property, geometry } => json!({
                "op": "s_intersects",
                "args": [prop(property), serde_json::to_value(geometry).unwrap_or(Value::Null)]
            }),
            FilterExpr::Overlaps { property, interval } => json!({
                "op": "t_intersects",
                "args": [prop(property), {"interval": [
                    interval.start.to_rfc3339(),
                    interval.end.to_rfc3339()
                ]}]
            }),
            FilterExpr::And(operands) => json!({
                "op": "and",
                "args": operands.iter().map(FilterExpr::to_cql2_json).collect::<Vec<_>>()
            }),
            FilterExpr::Or(operands) => json!({
                "op": "or",
                "args": operands.iter().map(FilterExpr::to_cql2_json).collect::<Vec<_>>()
            }),
            FilterExpr::Not(operand) => json!({"op": "not", "args": [operand.to_cql2_json()]}),
        }
    }
}

impl TryFrom<Value> for FilterExpr {
    type Error = SchemaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        FilterExpr::from_cql2_json(&value)
    }
}

impl From<FilterExpr> for Value {
    fn from(expr: FilterExpr) -> Self {
        expr.to_cql2_json()
    }
}

fn malformed(reason: impl Into<String>) -> SchemaError {
    SchemaError::Malformed(reason.into())
}

fn parse_operands(args: &[Value]) -> Result<Vec<FilterExpr>, SchemaError> {
    args.iter().map(FilterExpr::from_cql2_json).collect()
}

fn as_property(value: &Value) -> Option<&str> {
    value.as_object()?.get("property")?.as_str()
}

fn property_name(value: &Value) -> Result<String, SchemaError> {
    as_property(value)
        .map(str::to_string)
        .ok_or_else(|| malformed(format!("expected {{\"property\": ...}}, got {value}")))
}

fn comparison(op: ComparisonOp, args: &[Value]) -> Result<FilterExpr, SchemaError> {
    let [left, right] = args else {
        return Err(malformed(format!("'{op}' takes exactly two arguments")));
    };
    if let Some(property) = as_property(left) {
        return Ok(FilterExpr::compare(property, op, literal(right)?));
    }
    if let Some(property) = as_property(right) {
        return Ok(FilterExpr::compare(property, op.flipped(), literal(left)?));
    }
    Err(malformed(format!("'{op}' needs a property operand")))
}

fn literal(value: &Value) -> Result<Literal, SchemaError> {
    match value {
        Value::Bool(b) => Ok(Literal::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(Literal::Integer)
            .or_else(|| n.as_f64().map(Literal::Number))
            .ok_or_else(|| malformed(format!("unsupported number {n}"))),
        Value::String(s) => Ok(Literal::Text(s.clone())),
        Value::Object(object) => match object.get("timestamp").and_then(Value::as_str) {
            Some(raw) => parse_timestamp(raw).map(Literal::Timestamp),
            None => Err(malformed(format!("unsupported literal {value}"))),
        },
        _ => Err(malformed(format!("unsupported literal {value}"))),
    }
}

fn literal_json(literal: &Literal) -> Value {
    match literal {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Integer(i) => json!(i),
        Literal::Number(n) => json!(n),
        Literal::Text(s) => Value::String(s.clone()),
        Literal::Timestamp(t) => json!({"timestamp": t.to_rfc3339()}),
    }
}

fn prop(name: &str) -> Value {
    let mut object = Map::new();
    object.insert("property".to_string(), Value::String(name.to_string()));
    Value::Object(object)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SchemaError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| malformed(format!("invalid timestamp '{raw}': {e}")))
}

fn interval(value: &Value) -> Result<DatetimeInterval, SchemaError> {
    let bounds = value
        .as_object()
        .and_then(|o| o.get("interval"))
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(format!("expected {{\"interval\": [start, end]}}, got {value}")))?;
    match bounds.as_slice() {
        [Value::String(start), Value::String(end)] => Ok(DatetimeInterval::new(
            parse_timestamp(start)?,
            parse_timestamp(end)?,
        )),
        _ => Err(malformed("interval needs two timestamp strings")),
    }
}
