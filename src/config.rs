// Configuration management module
// This file handles loading and validation of configuration settings from an
// optional config file (ROUTER_CONFIG) overlaid by APP__ environment variables,
// and builds the venue adapters and router they describe
//
// Numan Thabit 2025 Nov

use alloy_primitives::Address;
use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::control::BreakerSettings;
use crate::decimals::{DecimalCache, DecimalResolver, OnchainDecimals};
use crate::router::{Router, RouterSettings};
use crate::token::Token;
use crate::transport::EthCall;
use crate::venues::uniswap::DEFAULT_FEE_TIERS;
use crate::venues::{
    AggregatorAdapter, ReservePool, ReservePoolAdapter, UniswapV2Adapter, UniswapV3Adapter,
    VenueAdapter, VenueId,
};
use crate::venues::adapter::{PairSupport, PoolKey};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// JSON-RPC endpoint used for every eth_call
    pub rpc_url: Url,
    /// Chain the endpoint must report; checked at startup
    pub chain_id: u64,
    pub native: NativeConfig,
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
    /// Default intermediate tokens for two-hop paths
    #[serde(default)]
    pub intermediates: Vec<Token>,
    #[serde(default = "default_per_call_timeout_ms")]
    pub per_call_timeout_ms: u64,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// Concurrency control
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    /// Hop calls started per second, unbounded when absent
    pub rate_per_sec: Option<u32>,
    #[serde(default = "default_api_addr")]
    pub api_addr: SocketAddr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NativeConfig {
    pub symbol: String,
    #[serde(default = "default_native_decimals")]
    pub decimals: u8,
    /// Wrapped-native contract that stands in for the native currency in calls
    pub wrapped: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorVenue {
    /// Index the aggregator contract reports
    pub index: u8,
    /// Our venue id for it
    pub venue: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VenueConfig {
    UniswapV2 {
        id: String,
        router: Address,
        /// Restrict the venue to pairs drawn from these tokens
        #[serde(default)]
        tokens: Vec<Token>,
    },
    UniswapV3 {
        id: String,
        quoter: Address,
        #[serde(default = "default_fee_tiers")]
        fee_tiers: Vec<u32>,
    },
    Aggregator {
        id: String,
        contract: Address,
        #[serde(default)]
        venues: Vec<AggregatorVenue>,
    },
    ReservePools {
        id: String,
        pools: Vec<ReservePool>,
    },
}

impl VenueConfig {
    pub fn id(&self) -> &str {
        match self {
            VenueConfig::UniswapV2 { id, .. }
            | VenueConfig::UniswapV3 { id, .. }
            | VenueConfig::Aggregator { id, .. }
            | VenueConfig::ReservePools { id, .. } => id,
        }
    }
}

fn default_per_call_timeout_ms() -> u64 {
    1500
}

fn default_query_timeout_ms() -> u64 {
    4000
}

fn default_max_inflight() -> usize {
    32
}

fn default_api_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_native_decimals() -> u8 {
    18
}

fn default_fee_tiers() -> Vec<u32> {
    DEFAULT_FEE_TIERS.to_vec()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var("ROUTER_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path));
        }
        let cfg = builder
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()
            .context("assemble configuration sources")?;
        let cfg: AppConfig = cfg.try_deserialize().context("deserialize configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.per_call_timeout_ms > 0, "per_call_timeout_ms must be positive");
        ensure!(
            self.query_timeout_ms >= self.per_call_timeout_ms,
            "query_timeout_ms ({}) is shorter than per_call_timeout_ms ({})",
            self.query_timeout_ms,
            self.per_call_timeout_ms
        );
        ensure!(self.max_inflight > 0, "max_inflight must be positive");
        ensure!(self.native.wrapped != Address::ZERO, "native.wrapped must be set");

        let mut ids = BTreeSet::new();
        for venue in &self.venues {
            if !ids.insert(venue.id()) {
                bail!("duplicate venue id: {}", venue.id());
            }
            if let VenueConfig::UniswapV3 { id, fee_tiers, .. } = venue {
                ensure!(!fee_tiers.is_empty(), "venue {id} has no fee tiers");
                ensure!(
                    fee_tiers.iter().all(|f| *f < 1 << 24),
                    "venue {id} has a fee tier above uint24"
                );
            }
        }
        for venue in &self.venues {
            if let VenueConfig::Aggregator { id, venues, .. } = venue {
                for mapped in venues {
                    ensure!(
                        ids.contains(mapped.venue.as_str()),
                        "aggregator {id} maps index {} to unknown venue {}",
                        mapped.index,
                        mapped.venue
                    );
                }
            }
        }
        for token in self.configured_tokens() {
            ensure!(
                token.chain_id == self.chain_id,
                "token {} is on chain {}, expected {}",
                token.label(),
                token.chain_id,
                self.chain_id
            );
            token
                .validate()
                .with_context(|| format!("invalid configured token {}", token.label()))?;
        }
        Ok(())
    }

    fn configured_tokens(&self) -> impl Iterator<Item = &Token> {
        let venue_tokens = self.venues.iter().flat_map(|v| -> Vec<&Token> {
            match v {
                VenueConfig::UniswapV2 { tokens, .. } => tokens.iter().collect(),
                VenueConfig::ReservePools { pools, .. } => {
                    pools.iter().flat_map(|p| [&p.token_a, &p.token_b]).collect()
                }
                _ => Vec::new(),
            }
        });
        self.intermediates.iter().chain(venue_tokens)
    }

    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            per_call_timeout: Duration::from_millis(self.per_call_timeout_ms),
            query_timeout: Duration::from_millis(self.query_timeout_ms),
            max_inflight: self.max_inflight,
            rate_per_sec: self.rate_per_sec,
            breakers: BreakerSettings::default(),
        }
    }

    /// Build one adapter per configured venue, in declaration order.
    pub fn build_adapters(&self, rpc: Arc<dyn EthCall>) -> Vec<Arc<dyn VenueAdapter>> {
        let wrapped = self.native.wrapped;
        self.venues
            .iter()
            .map(|venue| -> Arc<dyn VenueAdapter> {
                match venue {
                    VenueConfig::UniswapV2 { id, router, tokens } if tokens.is_empty() => {
                        Arc::new(UniswapV2Adapter::new(VenueId::new(id), rpc.clone(), *router, wrapped))
                    }
                    VenueConfig::UniswapV2 { id, router, tokens } => {
                        let support = PairSupport::Tokens {
                            tokens: tokens.iter().map(Token::key).collect(),
                            pools: vec![PoolKey::Default],
                        };
                        Arc::new(UniswapV2Adapter::with_support(
                            VenueId::new(id),
                            rpc.clone(),
                            *router,
                            wrapped,
                            support,
                        ))
                    }
                    VenueConfig::UniswapV3 { id, quoter, fee_tiers } => Arc::new(UniswapV3Adapter::new(
                        VenueId::new(id),
                        rpc.clone(),
                        *quoter,
                        wrapped,
                        fee_tiers,
                    )),
                    VenueConfig::Aggregator { id, contract, venues } => {
                        let venue_map: HashMap<u8, VenueId> = venues
                            .iter()
                            .map(|v| (v.index, VenueId::new(&v.venue)))
                            .collect();
                        Arc::new(AggregatorAdapter::new(
                            VenueId::new(id),
                            rpc.clone(),
                            *contract,
                            wrapped,
                            venue_map,
                        ))
                    }
                    VenueConfig::ReservePools { id, pools } => {
                        Arc::new(ReservePoolAdapter::new(VenueId::new(id), pools.clone()))
                    }
                }
            })
            .collect()
    }

    /// Router over the configured venues, sharing the process-wide decimal
    /// cache.
    pub fn build_router(&self, rpc: Arc<dyn EthCall>) -> Router {
        let resolver = DecimalResolver::new(
            Arc::new(OnchainDecimals::new(rpc.clone())),
            DecimalCache::shared(),
            self.native.decimals,
            Duration::from_millis(self.per_call_timeout_ms),
        );
        Router::new(
            self.build_adapters(rpc),
            resolver,
            self.intermediates.clone(),
            self.router_settings(),
        )
    }
}
