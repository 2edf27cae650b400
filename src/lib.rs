// Library root module for route-aggr
// This file defines the public API and module structure for the route-aggr library
// It exports the route query engine that can be used by other crates
//
// Numan Thabit 2025 Nov

pub mod config;
pub mod control;
pub mod decimals;
pub mod errors;
pub mod metrics;
pub mod quant;
pub mod router;
pub mod token;
pub mod transport;
pub mod venues;

pub use router::{Router, RouteRequest, RouteResponse};
pub use token::{SwapMode, Token};
