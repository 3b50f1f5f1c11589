//! Static checking of filter expressions against a product's constraint schema.
//!
//! Runs before any search so that an expression that can never be evaluated
//! meaningfully is rejected up front rather than silently matching nothing.

use super::expression::{ComparisonOp, FilterExpr, Literal};
use crate::models::{ConstraintSchema, FieldKind, FieldSpec};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("field '{field}' is {expected}, but '{operator}' was given {actual}")]
    TypeMismatch {
        field: String,
        operator: String,
        expected: String,
        actual: String,
    },

    #[error("value {value} is not allowed for field '{field}'")]
    ValueNotAllowed { field: String, value: String },

    #[error("'{combinator}' needs at least one operand")]
    EmptyCombinator { combinator: String },

    #[error("range on '{field}' has its lower bound above its upper bound")]
    InvalidRange { field: String },

    #[error("geometry for '{field}' is invalid: {reason}")]
    InvalidGeometry { field: String, reason: String },

    #[error("malformed filter expression: {0}")]
    Malformed(String),
}

/// Fields every opportunity carries regardless of what the product declares.
fn builtin_field(name: &str) -> Option<&'static FieldSpec> {
    static DATETIME: OnceLock<FieldSpec> = OnceLock::new();
    static GEOMETRY: OnceLock<FieldSpec> = OnceLock::new();
    static PRODUCT_ID: OnceLock<FieldSpec> = OnceLock::new();
    match name {
        "datetime" => Some(DATETIME.get_or_init(FieldSpec::datetime)),
        "geometry" => Some(GEOMETRY.get_or_init(FieldSpec::geometry)),
        "product_id" => Some(PRODUCT_ID.get_or_init(FieldSpec::string)),
        _ => None,
    }
}

fn lookup<'a>(schema: &'a ConstraintSchema, field: &str) -> Result<&'a FieldSpec, SchemaError> {
    schema
        .field(field)
        .or_else(|| builtin_field(field))
        .ok_or_else(|| SchemaError::UnknownField {
            field: field.to_string(),
        })
}

/// Validate every node of `expr` against `schema`, stopping at the first problem.
pub fn validate(expr: &FilterExpr, schema: &ConstraintSchema) -> Result<(), SchemaError> {
    match expr {
        FilterExpr::Comparison {
            property,
            op,
            value,
        } => {
            let spec = lookup(schema, property)?;
            check_literal(property, op.symbol(), &spec.kind, value)?;
            if !op.is_equality() && matches!(spec.kind, FieldKind::Boolean) {
                return Err(mismatch(property, op.symbol(), &spec.kind, "an ordering"));
            }
            if *op == ComparisonOp::Eq {
                check_enumeration(property, &spec.kind, value)?;
            }
            Ok(())
        }
        FilterExpr::Between {
            property,
            lower,
            upper,
        } => {
            let spec = lookup(schema, property)?;
            if !(spec.kind.is_numeric() || matches!(spec.kind, FieldKind::Datetime)) {
                return Err(mismatch(property, "between", &spec.kind, "a range"));
            }
            check_literal(property, "between", &spec.kind, lower)?;
            check_literal(property, "between", &spec.kind, upper)?;
            if bounds_inverted(lower, upper) {
                return Err(SchemaError::InvalidRange {
                    field: property.clone(),
                });
            }
            Ok(())
        }
        FilterExpr::In { property, values } => {
            let spec = lookup(schema, property)?;
            for value in values {
                check_literal(property, "in", &spec.kind, value)?;
                check_enumeration(property, &spec.kind, value)?;
            }
            Ok(())
        }
        FilterExpr::Intersects { property, geometry } => {
            let spec = lookup(schema, property)?;
            if !matches!(spec.kind, FieldKind::Geometry) {
                return Err(mismatch(property, "s_intersects", &spec.kind, "a geometry"));
            }
            geometry
                .validate()
                .map_err(|e| SchemaError::InvalidGeometry {
                    field: property.clone(),
                    reason: e.to_string(),
                })
        }
        FilterExpr::Overlaps { property, interval } => {
            let spec = lookup(schema, property)?;
            if !matches!(spec.kind, FieldKind::Datetime) {
                return Err(mismatch(property, "t_intersects", &spec.kind, "an interval"));
            }
            if !interval.is_valid() {
                return Err(SchemaError::InvalidRange {
                    field: property.clone(),
                });
            }
            Ok(())
        }
        FilterExpr::And(operands) => validate_all("and", operands, schema),
        FilterExpr::Or(operands) => validate_all("or", operands, schema),
        FilterExpr::Not(operand) => validate(operand, schema),
    }
}

fn validate_all(
    combinator: &str,
    operands: &[FilterExpr],
    schema: &ConstraintSchema,
) -> Result<(), SchemaError> {
    if operands.is_empty() {
        return Err(SchemaError::EmptyCombinator {
            combinator: combinator.to_string(),
        });
    }
    operands.iter().try_for_each(|operand| validate(operand, schema))
}

fn mismatch(field: &str, operator: &str, kind: &FieldKind, actual: &str) -> SchemaError {
    SchemaError::TypeMismatch {
        field: field.to_string(),
        operator: operator.to_string(),
        expected: kind.name().to_string(),
        actual: actual.to_string(),
    }
}

fn check_literal(
    field: &str,
    operator: &str,
    kind: &FieldKind,
    literal: &Literal,
) -> Result<(), SchemaError> {
    let compatible = match kind {
        FieldKind::Integer { .. } | FieldKind::Number { .. } => literal.as_f64().is_some(),
        FieldKind::String { .. } => matches!(literal, Literal::Text(_)),
        FieldKind::Boolean => matches!(literal, Literal::Bool(_)),
        FieldKind::Datetime => matches!(literal, Literal::Timestamp(_)),
        FieldKind::Geometry => false,
    };
    if compatible {
        Ok(())
    } else {
        Err(mismatch(
            field,
            operator,
            kind,
            &format!("a {} value {literal}", literal.type_name()),
        ))
    }
}

fn check_enumeration(field: &str, kind: &FieldKind, literal: &Literal) -> Result<(), SchemaError> {
    let allowed = match (kind, literal) {
        (
            FieldKind::Integer {
                allowed: Some(allowed),
                ..
            },
            Literal::Integer(v),
        ) => allowed.contains(v),
        (
            FieldKind::Integer {
                allowed: Some(allowed),
                ..
            },
            Literal::Number(v),
        ) => allowed.iter().any(|member| *member as f64 == *v),
        (
            FieldKind::String {
                allowed: Some(allowed),
            },
            Literal::Text(v),
        ) => allowed.contains(v),
        _ => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(SchemaError::ValueNotAllowed {
            field: field.to_string(),
            value: literal.to_string(),
        })
    }
}

fn bounds_inverted(lower: &Literal, upper: &Literal) -> bool {
    match (lower, upper) {
        (Literal::Timestamp(a), Literal::Timestamp(b)) => a > b,
        _ => match (lower.as_f64(), upper.as_f64()) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatetimeInterval, Geometry};
    use chrono::{TimeZone, Utc};

    fn schema() -> ConstraintSchema {
        ConstraintSchema::new()
            .with_field("off_nadir", FieldSpec::number_range(0.0, 45.0))
            .with_field("vehicle_id", FieldSpec::integer_one_of([1, 2, 5, 7, 8]))
            .with_field("platform", FieldSpec::string_one_of(["platform_id"]))
            .with_field("night", FieldSpec::boolean())
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let expr = FilterExpr::lte("cloud_cover", 20);
        assert_eq!(
            validate(&expr, &schema()),
            Err(SchemaError::UnknownField {
                field: "cloud_cover".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_field_nested_in_combinators() {
        let expr = FilterExpr::or([
            FilterExpr::lte("off_nadir", 20),
            FilterExpr::not(FilterExpr::eq("cloud_cover", 5)),
        ]);
        assert!(matches!(
            validate(&expr, &schema()),
            Err(SchemaError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_type_mismatches() {
        assert!(matches!(
            validate(&FilterExpr::between("platform", 1, 5), &schema()),
            Err(SchemaError::TypeMismatch { .. })
        ));
        assert!(matches!(
            validate(&FilterExpr::eq("off_nadir", "steep"), &schema()),
            Err(SchemaError::TypeMismatch { .. })
        ));
        assert!(matches!(
            validate(&FilterExpr::gt("night", true), &schema()),
            Err(SchemaError::TypeMismatch { .. })
        ));
        assert!(matches!(
            validate(
                &FilterExpr::intersects("off_nadir", Geometry::Point([0.0, 0.0])),
                &schema()
            ),
            Err(SchemaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_enumerations_and_ranges() {
        assert!(validate(&FilterExpr::one_of("vehicle_id", [1, 5]), &schema()).is_ok());
        assert!(matches!(
            validate(&FilterExpr::one_of("vehicle_id", [1, 3]), &schema()),
            Err(SchemaError::ValueNotAllowed { .. })
        ));
        assert!(validate(&FilterExpr::eq("vehicle_id", 5.0), &schema()).is_ok());
        assert!(matches!(
            validate(&FilterExpr::eq("vehicle_id", 3.0), &schema()),
            Err(SchemaError::ValueNotAllowed { .. })
        ));
        assert!(matches!(
            validate(&FilterExpr::eq("vehicle_id", 5.5), &schema()),
            Err(SchemaError::ValueNotAllowed { .. })
        ));
        assert!(matches!(
            validate(&FilterExpr::between("off_nadir", 30, 10), &schema()),
            Err(SchemaError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_builtin_fields_are_always_available() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let expr = FilterExpr::and([
            FilterExpr::overlaps(
                "datetime",
                DatetimeInterval::new(start, start + chrono::Duration::days(1)),
            ),
            FilterExpr::intersects("geometry", Geometry::bbox(-1.0, -1.0, 1.0, 1.0)),
            FilterExpr::eq("product_id", "test-spotlight"),
        ]);
        assert!(validate(&expr, &ConstraintSchema::new()).is_ok());
    }

    #[test]
    fn test_empty_combinator() {
        assert!(matches!(
            validate(&FilterExpr::And(vec![]), &schema()),
            Err(SchemaError::EmptyCombinator { .. })
        ));
    }
}
