//! # Order State Machine
//!
//! Table-driven order lifecycle. The pieces follow the usual split:
//!
//! - [`states`] and [`events`] define the vocabulary,
//! - [`order_state_machine::determine_target_state`] is the transition table,
//! - [`guards`] refuse otherwise-valid moves that would break an invariant,
//! - [`persistence`] commits a move with compare-and-append,
//! - [`actions`] run after commit (logging, event publication).

pub mod actions;
pub mod errors;
pub mod events;
pub mod guards;
pub mod order_state_machine;
pub mod persistence;
pub mod states;

// Re-export main types for convenient access
pub use errors::{ActionError, GuardError, PersistenceError};
pub use events::OrderEvent;
pub use order_state_machine::{determine_target_state, OrderStateMachine};
pub use states::OrderState;

// Common traits and utilities
pub use actions::StateAction;
pub use guards::StateGuard;
pub use persistence::{InMemoryOrderStore, OrderStore, TransitionChange};
