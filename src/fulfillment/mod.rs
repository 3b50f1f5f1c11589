//! # Fulfillment
//!
//! Moves accepted orders through the tasking backend: dispatch, backend
//! updates (pushed or polled) and backend-aware cancellation. Every state
//! change goes through the [`OrderStateMachine`](crate::state_machine::OrderStateMachine).

pub mod coordinator;

pub use coordinator::FulfillmentCoordinator;
