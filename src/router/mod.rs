// Router module - route discovery and quote validation
// This file wires path enumeration, quote fetching, sanity filtering and
// ranking behind the Router query entry point
//
// Numan Thabit 2025 Nov

pub mod fetcher;
pub mod paths;
pub mod routes;
pub mod selector;
pub mod validation;

#[allow(clippy::module_inception)]
pub mod router;

pub use fetcher::{FetchOutcome, QuoteFetcher};
pub use paths::enumerate_paths;
pub use router::{create_api_router, Router, RouterSettings};
pub use routes::{
    Diagnostics, Hop, Path, Quote, RankedRoute, RejectReason, RejectedPath, RouteRequest,
    RouteResponse,
};
pub use selector::rank_routes;
pub use validation::{filter_valid, SanityContext};
