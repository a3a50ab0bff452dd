//! # HTTP Server Module
//!
//! JSON API over `ScenarioService`, built on axum.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/metrics` - Counter snapshot
//! - `/trees` - Bundle installation
//! - `/scenarios/*` - Scenario commands and queries

pub mod observability_routes;
pub mod scenario_routes;
pub mod server;

pub use scenario_routes::{ErrorResponse, ACTOR_HEADER, TENANT_HEADER};
pub use server::HttpServer;
