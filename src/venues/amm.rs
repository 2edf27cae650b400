// AMM venue adapter module
// This file implements constant-product pool math and a venue backed by
// reserve snapshots (pools whose reserves are known off-chain, e.g. from an
// indexer export). Reserves are configured in display units and converted
// with the hop's resolved decimals.
//
// Numan Thabit 2025 Nov

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::errors::HopFailure;
use crate::quant::{narrow, parse_units, wide, Wide};
use crate::router::routes::Hop;
use crate::token::{SwapMode, Token};
use crate::venues::adapter::{
    HopDecimals, HopQuote, PairSupport, PoolKey, VenueAdapter, VenueDescriptor, VenueId, VenueKind,
};

const BPS: u64 = 10_000;

/// Output for an exact input, rounded down. `None` for empty pools, zero
/// input or zero output.
pub fn get_amount_out(reserve_in: U256, reserve_out: U256, amount_in: U256, fee_bps: u32) -> Option<U256> {
    if reserve_in.is_zero() || reserve_out.is_zero() || amount_in.is_zero() || fee_bps as u64 >= BPS {
        return None;
    }
    let in_with_fee = wide(amount_in) * Wide::from(BPS - fee_bps as u64);
    let numerator = in_with_fee * wide(reserve_out);
    let denominator = wide(reserve_in) * Wide::from(BPS) + in_with_fee;
    let out = narrow(numerator / denominator)?;
    (!out.is_zero()).then_some(out)
}

/// Input required for an exact output, rounded up. `None` when the pool
/// cannot deliver `amount_out`.
pub fn get_amount_in(reserve_in: U256, reserve_out: U256, amount_out: U256, fee_bps: u32) -> Option<U256> {
    if reserve_in.is_zero() || amount_out.is_zero() || amount_out >= reserve_out || fee_bps as u64 >= BPS {
        return None;
    }
    let numerator = wide(reserve_in) * wide(amount_out) * Wide::from(BPS);
    let denominator = wide(reserve_out - amount_out) * Wide::from(BPS - fee_bps as u64);
    let amount = (numerator + denominator - Wide::from(1u64)) / denominator;
    narrow(amount)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservePool {
    pub name: String,
    pub token_a: Token,
    pub token_b: Token,
    /// Display units of token_a, e.g. "5000.25".
    pub reserve_a: String,
    pub reserve_b: String,
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
}

fn default_fee_bps() -> u32 {
    30
}

pub struct ReservePoolAdapter {
    descriptor: VenueDescriptor,
    pools: HashMap<String, ReservePool>,
}

impl ReservePoolAdapter {
    pub fn new(id: VenueId, pools: Vec<ReservePool>) -> Self {
        let pairs = pools
            .iter()
            .map(|p| (p.token_a.key(), p.token_b.key(), PoolKey::Named(p.name.clone())))
            .collect();
        Self {
            descriptor: VenueDescriptor {
                id,
                kind: VenueKind::ReservePool,
                support: PairSupport::Pairs(pairs),
            },
            pools: pools.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    fn reserves(&self, hop: &Hop, decimals: HopDecimals) -> Result<(U256, U256, u32), HopFailure> {
        let PoolKey::Named(name) = &hop.pool else {
            return Err(HopFailure::NotFound);
        };
        let pool = self.pools.get(name).ok_or(HopFailure::NotFound)?;
        let (raw_in, raw_out) = if hop.token_in == pool.token_a && hop.token_out == pool.token_b {
            (&pool.reserve_a, &pool.reserve_b)
        } else if hop.token_in == pool.token_b && hop.token_out == pool.token_a {
            (&pool.reserve_b, &pool.reserve_a)
        } else {
            return Err(HopFailure::NotFound);
        };
        let to_base = |raw: &str, d: u8| {
            parse_units(raw, d).map_err(|e| HopFailure::Transport(format!("pool {name} reserve: {e}")))
        };
        Ok((
            to_base(raw_in, decimals.token_in)?,
            to_base(raw_out, decimals.token_out)?,
            pool.fee_bps,
        ))
    }
}

#[async_trait]
impl VenueAdapter for ReservePoolAdapter {
    fn descriptor(&self) -> &VenueDescriptor {
        &self.descriptor
    }

    async fn quote_hop(
        &self,
        hop: &Hop,
        decimals: HopDecimals,
        amount: U256,
        mode: SwapMode,
    ) -> Result<HopQuote, HopFailure> {
        let (reserve_in, reserve_out, fee_bps) = self.reserves(hop, decimals)?;
        let solved = match mode {
            SwapMode::ExactIn => get_amount_out(reserve_in, reserve_out, amount, fee_bps),
            SwapMode::ExactOut => get_amount_in(reserve_in, reserve_out, amount, fee_bps),
        };
        match solved {
            Some(amount) => Ok(HopQuote::direct(amount)),
            None => {
                debug!(hop = %hop, "reserve pool cannot fill hop");
                Err(HopFailure::NotFound)
            }
        }
    }
}
