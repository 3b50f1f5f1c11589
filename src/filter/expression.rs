use crate::models::{DatetimeInterval, Geometry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Eq),
            "<>" | "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            _ => None,
        }
    }

    /// The operator that gives the same answer with operands swapped.
    pub fn flipped(&self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
        }
    }

    /// Only equality makes sense for unordered types such as booleans.
    pub fn is_equality(&self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    pub fn matches(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Self::Eq => ordering == Equal,
            Self::Ne => ordering != Equal,
            Self::Lt => ordering == Less,
            Self::Lte => ordering != Greater,
            Self::Gt => ordering == Greater,
            Self::Gte => ordering != Less,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Typed scalar operand of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl Literal {
    /// Semantic type name used in schema error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Integer(_) | Self::Number(_) => "number",
            Self::Timestamp(_) => "datetime",
            Self::Text(_) => "string",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Text(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Filter expression over a closed set of node kinds.
///
/// Serialized as CQL2-JSON (see [`crate::filter::cql2`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum FilterExpr {
    Comparison {
        property: String,
        op: ComparisonOp,
        value: Literal,
    },
    /// Inclusive range.
    Between {
        property: String,
        lower: Literal,
        upper: Literal,
    },
    /// Equality against any of an enumeration.
    In {
        property: String,
        values: Vec<Literal>,
    },
    Intersects {
        property: String,
        geometry: Geometry,
    },
    Overlaps {
        property: String,
        interval: DatetimeInterval,
    },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    pub fn compare(property: impl Into<String>, op: ComparisonOp, value: impl Into<Literal>) -> Self {
        Self::Comparison {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(property, ComparisonOp::Eq, value)
    }

    pub fn lt(property: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(property, ComparisonOp::Lt, value)
    }

    pub fn lte(property: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(property, ComparisonOp::Lte, value)
    }

    pub fn gt(property: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(property, ComparisonOp::Gt, value)
    }

    pub fn gte(property: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(property, ComparisonOp::Gte, value)
    }

    pub fn between(
        property: impl Into<String>,
        lower: impl Into<Literal>,
        upper: impl Into<Literal>,
    ) -> Self {
        Self::Between {
            property: property.into(),
            lower: lower.into(),
            upper: upper.into(),
        }
    }

    pub fn one_of<L: Into<Literal>>(
        property: impl Into<String>,
        values: impl IntoIterator<Item = L>,
    ) -> Self {
        Self::In {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn intersects(property: impl Into<String>, geometry: Geometry) -> Self {
        Self::Intersects {
            property: property.into(),
            geometry,
        }
    }

    pub fn overlaps(property: impl Into<String>, interval: DatetimeInterval) -> Self {
        Self::Overlaps {
            property: property.into(),
            interval,
        }
    }

    pub fn and(operands: impl IntoIterator<Item = FilterExpr>) -> Self {
        Self::And(operands.into_iter().collect())
    }

    pub fn or(operands: impl IntoIterator<Item = FilterExpr>) -> Self {
        Self::Or(operands.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: FilterExpr) -> Self {
        Self::Not(Box::new(operand))
    }

    /// Every property name referenced anywhere in the tree.
    pub fn properties(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_properties(&mut names);
        names
    }

    fn collect_properties<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Comparison { property, .. }
            | Self::Between { property, .. }
            | Self::In { property, .. }
            | Self::Intersects { property, .. }
            | Self::Overlaps { property, .. } => names.push(property),
            Self::And(operands) | Self::Or(operands) => {
                operands.iter().for_each(|e| e.collect_properties(names))
            }
            Self::Not(operand) => operand.collect_properties(names),
        }
    }
}
