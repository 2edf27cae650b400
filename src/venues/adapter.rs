// Venue adapter module
// This file defines the single capability every liquidity source implements
// (quote one hop) and the descriptors the path enumerator reads to decide
// which hops a venue can plausibly serve
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::errors::HopFailure;
use crate::router::routes::Hop;
use crate::token::{SwapMode, Token, TokenKey};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(pub String);

impl VenueId {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Selects a pool within a venue for one hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKey {
    Default,
    FeeTier(u32),
    Named(String),
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKey::Default => f.write_str("default"),
            PoolKey::FeeTier(fee) => write!(f, "fee:{fee}"),
            PoolKey::Named(name) => write!(f, "pool:{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    UniswapV2,
    UniswapV3,
    Aggregator,
    ReservePool,
}

impl VenueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueKind::UniswapV2 => "uniswap_v2",
            VenueKind::UniswapV3 => "uniswap_v3",
            VenueKind::Aggregator => "aggregator",
            VenueKind::ReservePool => "reserve_pool",
        }
    }
}

/// Which token pairs a venue claims to serve, and through which pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairSupport {
    /// Any pair, through each of the listed pools.
    Any(Vec<PoolKey>),
    /// Any pair of tokens drawn from the allowlist.
    Tokens {
        tokens: BTreeSet<TokenKey>,
        pools: Vec<PoolKey>,
    },
    /// Exactly these unordered pairs.
    Pairs(Vec<(TokenKey, TokenKey, PoolKey)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueDescriptor {
    pub id: VenueId,
    pub kind: VenueKind,
    pub support: PairSupport,
}

impl VenueDescriptor {
    pub fn any_pair(id: VenueId, kind: VenueKind, pools: Vec<PoolKey>) -> Self {
        Self {
            id,
            kind,
            support: PairSupport::Any(pools),
        }
    }

    /// Pools this venue may route `token_in -> token_out` through, in
    /// declaration order. Empty when the pair is not served.
    pub fn pools_for(&self, token_in: &Token, token_out: &Token) -> Vec<PoolKey> {
        let (a, b) = (token_in.key(), token_out.key());
        if a == b {
            return Vec::new();
        }
        match &self.support {
            PairSupport::Any(pools) => pools.clone(),
            PairSupport::Tokens { tokens, pools } => {
                if tokens.contains(&a) && tokens.contains(&b) {
                    pools.clone()
                } else {
                    Vec::new()
                }
            }
            PairSupport::Pairs(pairs) => pairs
                .iter()
                .filter(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
                .map(|(_, _, pool)| pool.clone())
                .collect(),
        }
    }
}

/// Resolved precision of both tokens of a hop. The fetcher only builds one
/// when both are known, so adapters never see a guessed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopDecimals {
    pub token_in: u8,
    pub token_out: u8,
}

/// Successful hop quote: the solved amount in base units (output for
/// EXACT_IN, required input for EXACT_OUT).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopQuote {
    pub amount: U256,
    /// Set when the venue routed through another venue (aggregators).
    pub resolved_venue: Option<VenueId>,
    pub resolved_pool: Option<PoolKey>,
}

impl HopQuote {
    pub fn direct(amount: U256) -> Self {
        Self {
            amount,
            resolved_venue: None,
            resolved_pool: None,
        }
    }
}

#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn descriptor(&self) -> &VenueDescriptor;

    fn id(&self) -> &VenueId {
        &self.descriptor().id
    }

    /// Quote one hop. A missing pool is `Err(HopFailure::NotFound)`, which
    /// is routine and must not be logged above debug.
    async fn quote_hop(
        &self,
        hop: &Hop,
        decimals: HopDecimals,
        amount: U256,
        mode: SwapMode,
    ) -> Result<HopQuote, HopFailure>;
}

/// Address to pass to contracts for `token`: the wrapped token stands in for
/// the native currency.
pub fn contract_address(token: &Token, wrapped_native: Address) -> Address {
    if token.is_native() {
        wrapped_native
    } else {
        token.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(b: u8, sym: &str) -> Token {
        Token::erc20(1, Address::repeat_byte(b), sym)
    }

    #[test]
    fn pair_support_variants() {
        let (a, b, c) = (tok(1, "A"), tok(2, "B"), tok(3, "C"));
        let any = VenueDescriptor::any_pair(
            VenueId::new("v3"),
            VenueKind::UniswapV3,
            vec![PoolKey::FeeTier(500), PoolKey::FeeTier(3000)],
        );
        assert_eq!(any.pools_for(&a, &b).len(), 2);
        assert!(any.pools_for(&a, &a).is_empty());

        let listed = VenueDescriptor {
            id: VenueId::new("v2"),
            kind: VenueKind::UniswapV2,
            support: PairSupport::Tokens {
                tokens: [a.key(), b.key()].into_iter().collect(),
                pools: vec![PoolKey::Default],
            },
        };
        assert_eq!(listed.pools_for(&b, &a), vec![PoolKey::Default]);
        assert!(listed.pools_for(&a, &c).is_empty());

        let pairs = VenueDescriptor {
            id: VenueId::new("snap"),
            kind: VenueKind::ReservePool,
            support: PairSupport::Pairs(vec![(a.key(), b.key(), PoolKey::Named("ab".into()))]),
        };
        assert_eq!(pairs.pools_for(&b, &a), vec![PoolKey::Named("ab".into())]);
        assert!(pairs.pools_for(&b, &c).is_empty());
    }

    #[test]
    fn native_maps_to_wrapped() {
        let weth = Address::repeat_byte(0xee);
        assert_eq!(contract_address(&Token::native(1, "ETH"), weth), weth);
        let dai = tok(4, "DAI");
        assert_eq!(contract_address(&dai, weth), dai.address);
    }
}
