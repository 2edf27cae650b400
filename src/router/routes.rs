// Route types
// This file defines hops, paths, quotes and ranked routes, plus the request
// and response of a route query
//
// Numan Thabit 2025 Nov

use alloy_primitives::U256;
use serde::Serialize;
use std::fmt;

use crate::errors::{CallerInputError, HopFailure};
use crate::token::{SwapMode, Token, TokenKey};
use crate::venues::adapter::{PoolKey, VenueId};

/// Paths never exceed this many hops (one intermediate token).
pub const MAX_HOPS: u8 = 2;

/// One atomic exchange leg through one venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hop {
    pub venue: VenueId,
    pub token_in: Token,
    pub token_out: Token,
    pub pool: PoolKey,
}

impl Hop {
    pub fn new(venue: VenueId, token_in: Token, token_out: Token, pool: PoolKey) -> Self {
        Self {
            venue,
            token_in,
            token_out,
            pool,
        }
    }

    pub fn leg(&self) -> RouteLeg {
        RouteLeg {
            venue: self.venue.clone(),
            token_in: self.token_in.key(),
            token_out: self.token_out.key(),
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}->{}",
            self.venue,
            self.pool,
            self.token_in.label(),
            self.token_out.label()
        )
    }
}

/// Identity of a hop for deduplication: the pool inside the venue is not
/// part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteLeg {
    pub venue: VenueId,
    pub token_in: TokenKey,
    pub token_out: TokenKey,
}

/// Ordered, non-empty, connected sequence of hops.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    hops: Vec<Hop>,
}

impl Path {
    /// Returns `None` for an empty or disconnected hop sequence.
    pub fn new(hops: Vec<Hop>) -> Option<Self> {
        if hops.is_empty() {
            return None;
        }
        let connected = hops
            .windows(2)
            .all(|w| w[0].token_out.key() == w[1].token_in.key());
        connected.then_some(Self { hops })
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn sell_token(&self) -> &Token {
        &self.hops[0].token_in
    }

    pub fn buy_token(&self) -> &Token {
        &self.hops[self.hops.len() - 1].token_out
    }

    /// Every token on the path, sell token first.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        std::iter::once(&self.hops[0].token_in).chain(self.hops.iter().map(|h| &h.token_out))
    }

    pub fn route_key(&self) -> Vec<RouteLeg> {
        self.hops.iter().map(Hop::leg).collect()
    }

    pub(crate) fn hops_mut(&mut self) -> &mut [Hop] {
        &mut self.hops
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hop) in self.hops.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{hop}")?;
        }
        Ok(())
    }
}

/// A priced path. Amounts are base units of the sell and buy token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub path: Path,
    pub amount_in: U256,
    pub amount_out: U256,
    /// Amount at each token boundary, sell side first (`path.len() + 1`).
    pub hop_amounts: Vec<U256>,
    /// Adapter chain that produced the quote, e.g. `aggregator>uniswap-v3`.
    pub source: String,
}

/// A surviving quote with its effective price and 1-based rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRoute {
    pub quote: Quote,
    /// out/in (EXACT_IN) or in/out (EXACT_OUT) in display units.
    pub effective_price: f64,
    pub rank: usize,
}

#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub sell_token: Token,
    pub buy_token: Token,
    /// Base units of the sell token (EXACT_IN) or buy token (EXACT_OUT).
    pub amount: U256,
    pub mode: SwapMode,
    pub max_hops: Option<u8>,
    /// Falls back to the configured intermediates when absent.
    pub allowed_intermediates: Option<Vec<Token>>,
    /// Sell-token display units per buy-token display unit, if the caller
    /// has a price feed. Used only by the plausibility filter.
    pub reference_price: Option<f64>,
}

impl RouteRequest {
    pub fn new(sell_token: Token, buy_token: Token, amount: U256, mode: SwapMode) -> Self {
        Self {
            sell_token,
            buy_token,
            amount,
            mode,
            max_hops: None,
            allowed_intermediates: None,
            reference_price: None,
        }
    }

    pub fn with_max_hops(mut self, max_hops: u8) -> Self {
        self.max_hops = Some(max_hops);
        self
    }

    pub fn with_intermediates(mut self, tokens: Vec<Token>) -> Self {
        self.allowed_intermediates = Some(tokens);
        self
    }

    pub fn with_reference_price(mut self, price: f64) -> Self {
        self.reference_price = Some(price);
        self
    }

    /// Check the request and return the effective hop cap.
    pub fn validate(&self) -> Result<u8, CallerInputError> {
        if self.amount.is_zero() {
            return Err(CallerInputError::InvalidAmount("amount must be positive".into()));
        }
        self.sell_token.validate()?;
        self.buy_token.validate()?;
        if self.sell_token == self.buy_token {
            return Err(CallerInputError::SameToken);
        }
        if self.sell_token.chain_id != self.buy_token.chain_id {
            return Err(CallerInputError::ChainMismatch {
                sell: self.sell_token.chain_id,
                buy: self.buy_token.chain_id,
            });
        }
        let max_hops = self.max_hops.unwrap_or(MAX_HOPS);
        if !(1..=MAX_HOPS).contains(&max_hops) {
            return Err(CallerInputError::InvalidMaxHops(max_hops));
        }
        if let Some(price) = self.reference_price {
            if !price.is_finite() || price <= 0.0 {
                return Err(CallerInputError::InvalidReferencePrice(price));
            }
        }
        for token in self.allowed_intermediates.iter().flatten() {
            token.validate()?;
            if token.chain_id != self.sell_token.chain_id {
                return Err(CallerInputError::ChainMismatch {
                    sell: self.sell_token.chain_id,
                    buy: token.chain_id,
                });
            }
        }
        Ok(max_hops)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Required input implausibly small for the requested output.
    ImplausibleInput,
    /// A token on the path has no resolved decimals.
    DecimalsUnresolved,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::ImplausibleInput => "implausible_input",
            RejectReason::DecimalsUnresolved => "decimals_unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedPath {
    pub path: Path,
    pub reason: RejectReason,
    /// Adapter chain, when the path got as far as a quote.
    pub source: Option<String>,
    pub amount_in: Option<U256>,
    pub amount_out: Option<U256>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HopFailureCounts {
    pub not_found: usize,
    pub timeout: usize,
    pub transport: usize,
    pub decimals_unknown: usize,
    pub circuit_open: usize,
}

impl HopFailureCounts {
    pub fn record(&mut self, failure: &HopFailure) {
        match failure {
            HopFailure::NotFound => self.not_found += 1,
            HopFailure::Timeout => self.timeout += 1,
            HopFailure::Transport(_) => self.transport += 1,
            HopFailure::DecimalsUnknown => self.decimals_unknown += 1,
            HopFailure::CircuitOpen => self.circuit_open += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.not_found + self.timeout + self.transport + self.decimals_unknown + self.circuit_open
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub rejected: Vec<RejectedPath>,
    pub unresolved_tokens: Vec<TokenKey>,
    pub hop_failures: HopFailureCounts,
    pub paths_considered: usize,
    /// EXACT_OUT quotes kept without a plausibility check because nothing
    /// could serve as a reference rate.
    pub sanity_unchecked: usize,
    /// The overall query deadline elapsed before every path answered.
    pub timed_out: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RouteResponse {
    pub best: Option<RankedRoute>,
    pub all: Vec<RankedRoute>,
    pub diagnostics: Diagnostics,
}

impl RouteResponse {
    pub fn from_ranked(all: Vec<RankedRoute>, diagnostics: Diagnostics) -> Self {
        Self {
            best: all.first().cloned(),
            all,
            diagnostics,
        }
    }
}
