use crate::backend::{BackendError, CandidateQuery, CandidateWindow, TaskingBackend};
use crate::catalog::Catalog;
use crate::config::PaginationConfig;
use crate::error::{StapiError, StapiResult};
use crate::filter::{self, EvaluationContext, FilterExpr};
use crate::logging::log_search_operation;
use crate::models::{Opportunity, OpportunityPage, OpportunityRequest, PageCursor, Product};
use futures::stream::{self, Stream, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Validated, filtered, ordered and cursor-paginated opportunity search.
pub struct OpportunitySearchEngine {
    catalog: Arc<dyn Catalog>,
    backend: Arc<dyn TaskingBackend>,
    pagination: PaginationConfig,
}

impl OpportunitySearchEngine {
    pub fn new(catalog: Arc<dyn Catalog>, backend: Arc<dyn TaskingBackend>) -> Self {
        Self {
            catalog,
            backend,
            pagination: PaginationConfig::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// One page of opportunities for `product_id`, ordered by
    /// `(window start, id)` and resuming strictly after `request.next`.
    ///
    /// Everything about the request is checked before the backend is called.
    pub async fn search(
        &self,
        product_id: &str,
        request: &OpportunityRequest,
    ) -> StapiResult<OpportunityPage> {
        let started = Instant::now();
        let product = self.catalog.get_product(product_id).await?;
        let invalid = |reason: String| StapiError::invalid_request(Some(product_id), reason);

        request
            .geometry
            .validate()
            .map_err(|e| invalid(format!("invalid area of interest: {e}")))?;
        if !request.datetime.is_valid() {
            return Err(invalid(format!(
                "requested window {} starts after it ends",
                request.datetime
            )));
        }
        let limit = self.pagination.resolve(request.limit).map_err(invalid)?;
        let cursor = request
            .next
            .as_deref()
            .map(PageCursor::decode)
            .transpose()
            .map_err(|e| invalid(e.to_string()))?;
        if let Some(expr) = &request.filter {
            filter::validate(expr, &product.constraints)
                .map_err(|e| invalid(format!("invalid filter: {e}")))?;
        }

        let query = CandidateQuery {
            geometry: request.geometry.clone(),
            datetime: request.datetime,
        };
        let candidates = self
            .backend
            .find_opportunities(&product, &query)
            .await
            .map_err(|e| backend_error(product_id, e))?;
        let candidate_count = candidates.len();

        let mut opportunities: Vec<Opportunity> = candidates
            .into_iter()
            .filter_map(|window| into_opportunity(&product, window))
            .filter(|opportunity| matches_filter(request.filter.as_ref(), opportunity))
            .filter(|opportunity| {
                cursor.as_ref().map_or(true, |c| {
                    let (start, id) = opportunity.sort_key();
                    c.precedes(start, id)
                })
            })
            .collect();
        opportunities.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let next = if opportunities.len() > limit {
            opportunities.truncate(limit);
            opportunities.last().map(|last| {
                let (start, id) = last.sort_key();
                PageCursor::new(start, id).encode()
            })
        } else {
            None
        };

        log_search_operation(
            product_id,
            self.backend.name(),
            candidate_count,
            opportunities.len(),
            next.is_some(),
            started.elapsed().as_millis() as u64,
        );
        Ok(OpportunityPage {
            opportunities,
            next,
        })
    }

    /// Lazily fetch page after page until the last one. Stops after the first
    /// error.
    pub fn pages(
        &self,
        product_id: impl Into<String>,
        request: OpportunityRequest,
    ) -> impl Stream<Item = StapiResult<OpportunityPage>> + '_ {
        let product_id = product_id.into();
        stream::unfold(Some((product_id, request)), move |state| async move {
            let (product_id, request) = state?;
            match self.search(&product_id, &request).await {
                Ok(page) => {
                    let next = page
                        .next
                        .clone()
                        .map(|cursor| (product_id, request.with_next(cursor)));
                    Some((Ok(page), next))
                }
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Every matching opportunity, one at a time, fetched a page at a time.
    pub fn stream(
        &self,
        product_id: impl Into<String>,
        request: OpportunityRequest,
    ) -> impl Stream<Item = StapiResult<Opportunity>> + '_ {
        self.pages(product_id, request)
            .map_ok(|page| stream::iter(page.opportunities.into_iter().map(Ok::<_, StapiError>)))
            .try_flatten()
    }

    /// Check a filter against a product's constraint schema without searching.
    pub async fn validate_filter(&self, product_id: &str, expr: &FilterExpr) -> StapiResult<()> {
        let product = self.catalog.get_product(product_id).await?;
        filter::validate(expr, &product.constraints).map_err(|source| StapiError::Schema {
            product_id: product_id.to_string(),
            source,
        })
    }
}

fn into_opportunity(product: &Product, window: CandidateWindow) -> Option<Opportunity> {
    if !window.datetime.is_valid() {
        warn!(
            product_id = %product.id,
            opportunity_id = %window.id,
            window = %window.datetime,
            "Dropping candidate with inverted window"
        );
        return None;
    }
    Some(Opportunity {
        id: window.id,
        product_id: product.id.clone(),
        datetime: window.datetime,
        geometry: window.geometry,
        properties: window.properties,
        price: window.price,
    })
}

fn matches_filter(expr: Option<&FilterExpr>, opportunity: &Opportunity) -> bool {
    expr.map_or(true, |expr| {
        filter::evaluate(expr, &EvaluationContext::from_opportunity(opportunity))
    })
}

fn backend_error(product_id: &str, error: BackendError) -> StapiError {
    if error.is_transient() {
        StapiError::BackendUnavailable {
            product_id: Some(product_id.to_string()),
            reason: error.to_string(),
        }
    } else {
        StapiError::Internal(format!("backend failed for product {product_id}: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_mapping() {
        let err = backend_error(
            "test-spotlight",
            BackendError::Unavailable {
                reason: "timeout".to_string(),
            },
        );
        assert_eq!(err.kind(), "backend_unavailable");

        let err = backend_error("test-spotlight", BackendError::Internal("boom".to_string()));
        assert_eq!(err.kind(), "internal");
    }
}
