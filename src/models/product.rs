//! # Products and Field Schemas
//!
//! A [`Product`] describes one tasking capability: who provides it, which
//! fields clients may filter opportunities on (`constraints`), and which
//! parameters an order for it accepts (`order_parameters`). Both schemas use the
//! same [`FieldSpec`] vocabulary.
//!
//! Products are immutable once published and are shared as `Arc<Product>`.

use super::datetime_interval::DatetimeInterval;
use super::geometry::Geometry;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    Licensor,
    Producer,
    Processor,
    Host,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub roles: Vec<ProviderRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Semantic type of a schema field together with its range or enumeration metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
        #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
        allowed: Option<Vec<i64>>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    String {
        #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
        allowed: Option<Vec<String>>,
    },
    Boolean,
    Datetime,
    Geometry,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer { .. } => "integer",
            Self::Number { .. } => "number",
            Self::String { .. } => "string",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
            Self::Geometry => "geometry",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer { .. } | Self::Number { .. })
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            description: None,
            required: false,
        }
    }

    pub fn integer() -> Self {
        Self::of(FieldKind::Integer {
            minimum: None,
            maximum: None,
            allowed: None,
        })
    }

    pub fn integer_range(minimum: i64, maximum: i64) -> Self {
        Self::of(FieldKind::Integer {
            minimum: Some(minimum),
            maximum: Some(maximum),
            allowed: None,
        })
    }

    pub fn integer_one_of(allowed: impl IntoIterator<Item = i64>) -> Self {
        Self::of(FieldKind::Integer {
            minimum: None,
            maximum: None,
            allowed: Some(allowed.into_iter().collect()),
        })
    }

    pub fn number() -> Self {
        Self::of(FieldKind::Number {
            minimum: None,
            maximum: None,
        })
    }

    pub fn number_range(minimum: f64, maximum: f64) -> Self {
        Self::of(FieldKind::Number {
            minimum: Some(minimum),
            maximum: Some(maximum),
        })
    }

    pub fn string() -> Self {
        Self::of(FieldKind::String { allowed: None })
    }

    pub fn string_one_of<S: Into<String>>(allowed: impl IntoIterator<Item = S>) -> Self {
        Self::of(FieldKind::String {
            allowed: Some(allowed.into_iter().map(Into::into).collect()),
        })
    }

    pub fn boolean() -> Self {
        Self::of(FieldKind::Boolean)
    }

    pub fn datetime() -> Self {
        Self::of(FieldKind::Datetime)
    }

    pub fn geometry() -> Self {
        Self::of(FieldKind::Geometry)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check a concrete JSON value against this field's type, range and enumeration.
    pub fn check_value(&self, value: &Value) -> Result<(), String> {
        match &self.kind {
            FieldKind::Integer {
                minimum,
                maximum,
                allowed,
            } => {
                let v = value
                    .as_i64()
                    .ok_or_else(|| format!("expected integer, got {value}"))?;
                if minimum.is_some_and(|min| v < min) || maximum.is_some_and(|max| v > max) {
                    return Err(format!(
                        "{v} is outside [{}, {}]",
                        bound(minimum),
                        bound(maximum)
                    ));
                }
                if let Some(allowed) = allowed {
                    if !allowed.contains(&v) {
                        return Err(format!("{v} is not one of {allowed:?}"));
                    }
                }
                Ok(())
            }
            FieldKind::Number { minimum, maximum } => {
                let v = value
                    .as_f64()
                    .ok_or_else(|| format!("expected number, got {value}"))?;
                if minimum.is_some_and(|min| v < min) || maximum.is_some_and(|max| v > max) {
                    return Err(format!(
                        "{v} is outside [{}, {}]",
                        bound(minimum),
                        bound(maximum)
                    ));
                }
                Ok(())
            }
            FieldKind::String { allowed } => {
                let v = value
                    .as_str()
                    .ok_or_else(|| format!("expected string, got {value}"))?;
                match allowed {
                    Some(allowed) if !allowed.iter().any(|a| a == v) => {
                        Err(format!("'{v}' is not one of {allowed:?}"))
                    }
                    _ => Ok(()),
                }
            }
            FieldKind::Boolean => value
                .as_bool()
                .map(|_| ())
                .ok_or_else(|| format!("expected boolean, got {value}")),
            FieldKind::Datetime => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| format!("expected datetime string, got {value}"))?;
                if DateTime::parse_from_rfc3339(raw).is_ok()
                    || raw.parse::<DatetimeInterval>().is_ok()
                {
                    Ok(())
                } else {
                    Err(format!("'{raw}' is neither an RFC 3339 datetime nor an interval"))
                }
            }
            FieldKind::Geometry => {
                let geometry: Geometry = serde_json::from_value(value.clone())
                    .map_err(|e| format!("expected GeoJSON geometry: {e}"))?;
                geometry.validate().map_err(|e| e.to_string())
            }
        }
    }
}

fn bound<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "..".to_string())
}

/// Named, typed fields. Used both for opportunity constraints and for order parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl ConstraintSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate a parameter object: required fields present, no undeclared
    /// fields, every value matching its spec. Reports all violations at once.
    pub fn check_values(&self, values: &Map<String, Value>) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();

        for (name, spec) in &self.fields {
            match values.get(name) {
                None | Some(Value::Null) if spec.required => {
                    violations.push(format!("missing required field '{name}'"));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    if let Err(e) = spec.check_value(value) {
                        violations.push(format!("field '{name}': {e}"));
                    }
                }
            }
        }

        for name in values.keys() {
            if !self.fields.contains_key(name) {
                violations.push(format!("unknown field '{name}'"));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub constraints: ConstraintSchema,
    #[serde(default)]
    pub order_parameters: ConstraintSchema,
}

impl Product {
    pub fn builder(id: impl Into<String>) -> ProductBuilder {
        ProductBuilder::new(id)
    }
}

/// Builder for [`Product`]
#[derive(Debug)]
pub struct ProductBuilder {
    product: Product,
}

impl ProductBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            product: Product {
                title: id.clone(),
                id,
                description: String::new(),
                license: "proprietary".to_string(),
                keywords: Vec::new(),
                providers: Vec::new(),
                constraints: ConstraintSchema::new(),
                order_parameters: ConstraintSchema::new(),
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.product.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.product.description = description.into();
        self
    }

    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.product.license = license.into();
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.product.keywords.push(keyword.into());
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.product.providers.push(provider);
        self
    }

    pub fn constraint(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.product.constraints = self.product.constraints.with_field(name, spec);
        self
    }

    pub fn order_parameter(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.product.order_parameters = self.product.order_parameters.with_field(name, spec);
        self
    }

    pub fn build(self) -> Product {
        self.product
    }
}
