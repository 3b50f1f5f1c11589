use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};
use stapi_core::backend::{CandidateWindow, SimulatedBackend};
use stapi_core::bootstrap::{StapiBootstrap, StapiSystem};
use stapi_core::catalog::InMemoryCatalog;
use stapi_core::models::{
    DatetimeInterval, FieldSpec, Geometry, Opportunity, OrderDraft, Price, Product,
};
use stapi_core::Order;
use std::sync::Arc;

pub const PRODUCT_ID: &str = "test-spotlight";

pub fn spotlight_product() -> Product {
    Product::builder(PRODUCT_ID)
        .title("Test Spotlight")
        .constraint("off_nadir", FieldSpec::integer_range(0, 45))
        .constraint("vehicle_id", FieldSpec::integer_one_of([1, 2, 5, 7, 8]))
        .constraint("platform", FieldSpec::string())
        .order_parameter("s3_path", FieldSpec::string().required())
        .build()
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
}

pub fn window(hour: u32) -> DatetimeInterval {
    DatetimeInterval::new(at(hour, 0), at(hour, 0) + Duration::hours(1))
}

pub fn full_day() -> DatetimeInterval {
    DatetimeInterval::new(at(0, 0), at(0, 0) + Duration::days(1))
}

pub fn area() -> Geometry {
    Geometry::bbox(10.0, 50.0, 11.0, 51.0)
}

pub fn properties(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn candidate(id: &str, hour: u32, off_nadir: i64, vehicle_id: i64) -> CandidateWindow {
    CandidateWindow {
        id: id.to_string(),
        datetime: window(hour),
        geometry: Geometry::bbox(10.2, 50.2, 10.4, 50.4),
        properties: properties(json!({
            "off_nadir": off_nadir,
            "vehicle_id": vehicle_id,
            "platform": "platform_id",
        })),
        price: Some(Price {
            amount_minor: 12_500,
            currency: "USD".to_string(),
        }),
    }
}

/// Six windows across the day. `opp-c` and `opp-d` share a start time.
pub fn default_candidates() -> Vec<CandidateWindow> {
    vec![
        candidate("opp-e", 9, 40, 8),
        candidate("opp-a", 1, 10, 1),
        candidate("opp-d", 5, 30, 5),
        candidate("opp-c", 5, 15, 2),
        candidate("opp-b", 3, 25, 7),
        candidate("opp-f", 12, 5, 3),
    ]
}

pub fn opportunity(id: &str, hour: u32) -> Opportunity {
    Opportunity {
        id: id.to_string(),
        product_id: PRODUCT_ID.to_string(),
        datetime: window(hour),
        geometry: Geometry::bbox(10.2, 50.2, 10.4, 50.4),
        properties: properties(json!({"off_nadir": 20, "vehicle_id": 2, "platform": "platform_id"})),
        price: None,
    }
}

pub fn draft() -> OrderDraft {
    OrderDraft::new(opportunity("opp-a", 0)).with_parameter("s3_path", json!("s3://bucket/out"))
}

pub struct TestHarness {
    pub system: StapiSystem,
    pub backend: Arc<SimulatedBackend>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_backend(SimulatedBackend::new("sim"))
    }

    pub fn with_backend(backend: SimulatedBackend) -> Self {
        let backend = Arc::new(backend);
        backend.add_candidates(PRODUCT_ID, default_candidates());
        let catalog = InMemoryCatalog::with_products([spotlight_product()]).unwrap();
        let system = StapiBootstrap::in_memory(Arc::new(catalog), backend.clone());
        Self { system, backend }
    }

    pub async fn submitted(&self) -> Order {
        self.system.orders.submit(draft()).await.unwrap()
    }

    pub async fn accepted(&self) -> Order {
        let order = self.submitted().await;
        self.system
            .orders
            .transition(order.id(), stapi_core::OrderEvent::AdmissionAccepted)
            .await
            .unwrap()
    }

    pub async fn in_progress(&self) -> Order {
        let order = self.accepted().await;
        self.system.fulfillment.dispatch(order.id()).await.unwrap();
        self.system.orders.get_order(order.id()).await.unwrap()
    }
}

/// `history.last().status == status`
pub fn assert_history_consistent(order: &Order) {
    let last = order.history().last().expect("history is never empty");
    assert_eq!(last.status, order.status());
}
