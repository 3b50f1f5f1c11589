//! # Constraint Filter
//!
//! Typed filter expressions over opportunity properties: a closed expression
//! tree ([`FilterExpr`]), its CQL2-JSON encoding, static validation against a
//! product's [`ConstraintSchema`](crate::models::ConstraintSchema), and pure
//! evaluation against an [`EvaluationContext`].
//!
//! Validation and evaluation are deliberately separate passes. A search
//! validates once, then evaluates the same expression against every candidate;
//! evaluation never fails, it only answers `true` or `false`.

pub mod cql2;
pub mod evaluate;
pub mod expression;
pub mod validate;

pub use evaluate::{evaluate, ContextValue, EvaluationContext};
pub use expression::{ComparisonOp, FilterExpr, Literal};
pub use validate::{validate, SchemaError};
