use super::datetime_interval::DatetimeInterval;
use super::geometry::Geometry;
use crate::filter::FilterExpr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Price estimate in the smallest currency unit (e.g. cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount_minor: u64,
    pub currency: String,
}

/// A concrete, time-bounded, feasible tasking slot for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub product_id: String,
    pub datetime: DatetimeInterval,
    pub geometry: Geometry,
    /// Feasibility and quality attributes (off-nadir angle, platform, ...).
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

impl Opportunity {
    /// Ordering key for search results: window start, then id.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.datetime.start, self.id.as_str())
    }
}

/// Parameters of one opportunity search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRequest {
    pub datetime: DatetimeInterval,
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
    /// Opaque token from a previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Page size; the configured default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl OpportunityRequest {
    pub fn new(datetime: DatetimeInterval, geometry: Geometry) -> Self {
        Self {
            datetime,
            geometry,
            filter: None,
            next: None,
            limit: None,
        }
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    /// The search body without paging fields, as recorded on orders.
    pub fn search_parameters(&self) -> SearchParameters {
        SearchParameters {
            datetime: self.datetime,
            geometry: self.geometry.clone(),
            filter: self.filter.clone(),
        }
    }
}

/// The space/time/filter constraints a client searched with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub datetime: DatetimeInterval,
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityPage {
    pub opportunities: Vec<Opportunity>,
    /// Token for the following page; `None` on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}
