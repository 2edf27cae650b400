// Venue module - liquidity sources behind a uniform hop-quote capability
//
// Numan Thabit 2025 Nov

pub mod adapter;
pub mod aggregator;
pub mod amm;
pub mod uniswap;

pub use adapter::{HopDecimals, HopQuote, PoolKey, VenueAdapter, VenueDescriptor, VenueId, VenueKind};
pub use aggregator::AggregatorAdapter;
pub use amm::{ReservePool, ReservePoolAdapter};
pub use uniswap::{UniswapV2Adapter, UniswapV3Adapter};
