//! # Opportunity Search
//!
//! Turns an [`OpportunityRequest`](crate::models::OpportunityRequest) into
//! pages of feasible opportunities:
//!
//! 1. look up the product in the catalog,
//! 2. validate the area of interest, window, page size, cursor and filter,
//! 3. ask the tasking backend for candidate windows,
//! 4. drop candidates with inverted windows or failing the filter,
//! 5. order by `(window start, id)` and cut the page after the cursor.
//!
//! The same request with successive `next` tokens walks the full result set;
//! [`OpportunitySearchEngine::stream`] does that walk lazily.

pub mod engine;

pub use engine::OpportunitySearchEngine;
