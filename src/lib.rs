#![allow(clippy::doc_markdown)] // Allow technical terms like CQL2, GeoJSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # STAPI Core
//!
//! The core of a Sensor Tasking API provider: a product catalog, opportunity
//! search over an injected tasking backend, and an order lifecycle that runs
//! from admission to backend completion.
//!
//! ## Module Organization
//!
//! - [`models`] - Products, opportunities, orders, geometry and time intervals
//! - [`filter`] - CQL2-JSON filter expressions: parsing, schema validation, evaluation
//! - [`catalog`] - Product lookup behind the [`catalog::Catalog`] trait
//! - [`backend`] - The [`backend::TaskingBackend`] seam plus a simulated backend
//! - [`search`] - Validated, filtered, cursor-paginated opportunity search
//! - [`state_machine`] - Table-driven order lifecycle with compare-and-append persistence
//! - [`fulfillment`] - Dispatch, backend updates and backend-aware cancellation
//! - [`events`] - Broadcast of committed order transitions
//! - [`config`] - Layered configuration
//! - [`bootstrap`] - Wiring everything together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stapi_core::backend::SimulatedBackend;
//! use stapi_core::bootstrap::StapiBootstrap;
//! use stapi_core::catalog::InMemoryCatalog;
//! use stapi_core::models::{FieldSpec, Product};
//!
//! # async fn example() -> stapi_core::StapiResult<()> {
//! let catalog = InMemoryCatalog::with_products([Product::builder("spotlight")
//!     .constraint("off_nadir", FieldSpec::integer_range(0, 45))
//!     .build()])?;
//! let system = StapiBootstrap::in_memory(Arc::new(catalog), Arc::new(SimulatedBackend::default()));
//!
//! let orders = system.orders.list_orders(None, None).await?;
//! assert!(orders.orders.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod filter;
pub mod fulfillment;
pub mod logging;
pub mod models;
pub mod search;
pub mod state_machine;

pub use bootstrap::{StapiBootstrap, StapiSystem};
pub use config::{ConfigManager, StapiConfig};
pub use error::{StapiError, StapiResult};
pub use filter::FilterExpr;
pub use fulfillment::FulfillmentCoordinator;
pub use models::{Opportunity, Order, OrderDraft, Product};
pub use search::OpportunitySearchEngine;
pub use state_machine::{OrderEvent, OrderState, OrderStateMachine};
