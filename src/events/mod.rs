//! Lifecycle event publication.
//!
//! Every committed order transition is announced on a broadcast channel under
//! `order.<status>`; see [`crate::constants::events`] for the names.

pub mod publisher;

pub use publisher::{EventPublisher, PublishError, PublishedEvent};
