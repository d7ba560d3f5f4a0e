//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (method, pre-split URL)
//!     → router.rs (services in order, routes in order)
//!     → matcher.rs (method check, Format parse)
//!     → handler runs with the captured value, or the chain falls through
//!     → nothing started at the end: not-found (404 "Not Found")
//! ```
//!
//! # Design Decisions
//! - Routes are built before the server starts and never change afterwards
//! - First match wins; a started response stops the chain
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{delete, get, patch, post, put, route, Route};
pub use router::{lookup, router, Chain, Lookup, NotFound, Router, Service};
