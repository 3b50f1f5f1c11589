//! # Data Model
//!
//! Products, opportunities, orders and the geometry/time primitives they are
//! built from. Everything here is plain data with serde support; behaviour that
//! changes an order lives in [`crate::state_machine`].

pub mod cursor;
pub mod datetime_interval;
pub mod geometry;
pub mod opportunity;
pub mod order;
pub mod product;

pub use cursor::{CursorError, PageCursor};
pub use datetime_interval::DatetimeInterval;
pub use geometry::{BoundingBox, Geometry, GeometryError, Position};
pub use opportunity::{Opportunity, OpportunityPage, OpportunityRequest, Price, SearchParameters};
pub use order::{BackendRef, Order, OrderDraft, OrderPage, StatusRecord};
pub use product::{
    ConstraintSchema, FieldKind, FieldSpec, Product, ProductBuilder, Provider, ProviderRole,
};
