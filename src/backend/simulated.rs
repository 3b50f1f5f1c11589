//! In-process backend that replays configured candidate windows.
//!
//! Nothing is scheduled: `find_opportunities` returns the windows registered
//! for a product that touch the query's area and window, and dispatched tasking
//! only changes status when a test (or a demo) says so through
//! [`SimulatedBackend::complete`] and [`SimulatedBackend::fail`].

use super::{
    BackendCapabilities, BackendError, BackendEvent, BackendResult, CandidateQuery,
    CandidateWindow, TaskingBackend,
};
use crate::models::{BackendRef, Order, Product};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
struct SimulatedTask {
    order_id: uuid::Uuid,
    kind: String,
    message: Option<String>,
}

#[derive(Debug)]
pub struct SimulatedBackend {
    name: String,
    capabilities: BackendCapabilities,
    candidates: RwLock<HashMap<String, Vec<CandidateWindow>>>,
    tasks: DashMap<BackendRef, SimulatedTask>,
    available: AtomicBool,
    reject_dispatch: AtomicBool,
    dispatch_delay: Mutex<Option<Duration>>,
    next_task: AtomicU64,
}

impl SimulatedBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: BackendCapabilities::default(),
            candidates: RwLock::new(HashMap::new()),
            tasks: DashMap::new(),
            available: AtomicBool::new(true),
            reject_dispatch: AtomicBool::new(false),
            dispatch_delay: Mutex::new(None),
            next_task: AtomicU64::new(1),
        }
    }

    pub fn with_mid_flight_cancel(mut self, enabled: bool) -> Self {
        self.capabilities.supports_mid_flight_cancel = enabled;
        self
    }

    /// Register candidate windows for a product
    pub fn add_candidates(
        &self,
        product_id: impl Into<String>,
        windows: impl IntoIterator<Item = CandidateWindow>,
    ) {
        self.candidates
            .write()
            .entry(product_id.into())
            .or_default()
            .extend(windows);
    }

    /// Make every call fail with [`BackendError::Unavailable`]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_reject_dispatch(&self, reject: bool) {
        self.reject_dispatch.store(reject, Ordering::SeqCst);
    }

    /// Hold each dispatch for `delay` before answering
    pub fn set_dispatch_delay(&self, delay: Option<Duration>) {
        *self.dispatch_delay.lock() = delay;
    }

    /// Mark dispatched tasking as fulfilled
    pub fn complete(&self, backend_ref: &BackendRef) -> BackendResult<()> {
        self.set_status(backend_ref, "succeeded", None)
    }

    /// Mark dispatched tasking as failed
    pub fn fail(&self, backend_ref: &BackendRef, reason: impl Into<String>) -> BackendResult<()> {
        self.set_status(backend_ref, "failed", Some(reason.into()))
    }

    /// Current status kind of dispatched tasking
    pub fn task_status(&self, backend_ref: &BackendRef) -> Option<String> {
        self.tasks.get(backend_ref).map(|task| task.kind.clone())
    }

    /// Order a reference was issued for
    pub fn order_for(&self, backend_ref: &BackendRef) -> Option<uuid::Uuid> {
        self.tasks.get(backend_ref).map(|task| task.order_id)
    }

    /// References issued so far, in issue order
    pub fn dispatched(&self) -> Vec<BackendRef> {
        let mut refs: Vec<(u64, BackendRef)> = self
            .tasks
            .iter()
            .map(|entry| (Self::sequence(entry.key()), entry.key().clone()))
            .collect();
        refs.sort_by_key(|(sequence, _)| *sequence);
        refs.into_iter().map(|(_, backend_ref)| backend_ref).collect()
    }

    pub fn cancelled(&self) -> Vec<BackendRef> {
        self.dispatched()
            .into_iter()
            .filter(|backend_ref| self.task_status(backend_ref).as_deref() == Some("cancelled"))
            .collect()
    }

    fn sequence(backend_ref: &BackendRef) -> u64 {
        backend_ref
            .as_str()
            .rsplit('-')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(u64::MAX)
    }

    fn set_status(
        &self,
        backend_ref: &BackendRef,
        kind: &str,
        message: Option<String>,
    ) -> BackendResult<()> {
        let mut task = self
            .tasks
            .get_mut(backend_ref)
            .ok_or_else(|| BackendError::NotFound {
                backend_ref: backend_ref.to_string(),
            })?;
        task.kind = kind.to_string();
        task.message = message;
        Ok(())
    }

    fn ensure_available(&self) -> BackendResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable {
                reason: format!("{} is offline", self.name),
            })
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new("simulated")
    }
}

#[async_trait]
impl TaskingBackend for SimulatedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    async fn find_opportunities(
        &self,
        product: &Product,
        query: &CandidateQuery,
    ) -> BackendResult<Vec<CandidateWindow>> {
        self.ensure_available()?;
        let candidates = self.candidates.read();
        let windows: Vec<CandidateWindow> = candidates
            .get(&product.id)
            .map(|windows| {
                windows
                    .iter()
                    .filter(|w| w.datetime.overlaps(&query.datetime))
                    .filter(|w| w.geometry.intersects(&query.geometry))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        debug!(
            backend = %self.name,
            product_id = %product.id,
            candidates = windows.len(),
            "Simulated candidate windows"
        );
        Ok(windows)
    }

    async fn dispatch(&self, order: &Order) -> BackendResult<BackendRef> {
        self.ensure_available()?;
        let delay = *self.dispatch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject_dispatch.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected {
                reason: format!("{} has no capacity for order {}", self.name, order.id()),
            });
        }

        let sequence = self.next_task.fetch_add(1, Ordering::SeqCst);
        let backend_ref = BackendRef::new(format!("{}-task-{sequence}", self.name))
            .map_err(BackendError::Internal)?;
        self.tasks.insert(
            backend_ref.clone(),
            SimulatedTask {
                order_id: order.id(),
                kind: "in_progress".to_string(),
                message: None,
            },
        );
        debug!(backend = %self.name, order_id = %order.id(), %backend_ref, "Simulated dispatch");
        Ok(backend_ref)
    }

    async fn cancel(&self, backend_ref: &BackendRef) -> BackendResult<()> {
        self.ensure_available()?;
        self.set_status(backend_ref, "cancelled", None)
    }

    async fn status(&self, backend_ref: &BackendRef) -> BackendResult<BackendEvent> {
        self.ensure_available()?;
        let task = self
            .tasks
            .get(backend_ref)
            .ok_or_else(|| BackendError::NotFound {
                backend_ref: backend_ref.to_string(),
            })?;
        let mut event = BackendEvent::new(backend_ref.clone(), task.kind.clone());
        event.message = task.message.clone();
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatetimeInterval, Geometry};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn window(id: &str, hour: u32, lon: f64) -> CandidateWindow {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        CandidateWindow {
            id: id.to_string(),
            datetime: DatetimeInterval::new(start, start + ChronoDuration::minutes(30)),
            geometry: Geometry::Point([lon, 0.0]),
            properties: Default::default(),
            price: None,
        }
    }

    fn query() -> CandidateQuery {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        CandidateQuery {
            geometry: Geometry::bbox(-1.0, -1.0, 1.0, 1.0),
            datetime: DatetimeInterval::new(start, start + ChronoDuration::hours(6)),
        }
    }

    #[tokio::test]
    async fn test_candidates_are_clipped_to_query() {
        let backend = SimulatedBackend::default();
        backend.add_candidates(
            "test-spotlight",
            [window("in", 1, 0.0), window("far", 1, 50.0), window("late", 12, 0.0)],
        );
        let product = Product::builder("test-spotlight").build();

        let windows = backend.find_opportunities(&product, &query()).await.unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].id, "in");

        let other = Product::builder("other").build();
        assert!(backend.find_opportunities(&other, &query()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let backend = SimulatedBackend::default();
        backend.set_available(false);
        let product = Product::builder("test-spotlight").build();
        let err = backend.find_opportunities(&product, &query()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_capabilities_flag() {
        assert!(!SimulatedBackend::default().capabilities().supports_mid_flight_cancel);
        assert!(
            SimulatedBackend::default()
                .with_mid_flight_cancel(true)
                .capabilities()
                .supports_mid_flight_cancel
        );
    }
}
