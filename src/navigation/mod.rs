//! Navigation
//!
//! Which nodes of a scenario's tree are visible, required and answered.
//!
//! # Invariants
//!
//! - Availability is a pure function of the published tree and the answers
//! - A node under an invisible ancestor is invisible
//! - Only visible nodes can be required
//! - The cache may lag by at most its refresh interval and is never the
//!   system of record

mod cache;
mod engine;

pub use cache::AvailabilityCache;
pub use engine::{Availability, NavigationEngine, NodeAvailability};
