// Aggregator venue adapter
// A singleton contract that quotes across several underlying venues in one
// eth_call and reports which venue (and fee tier) produced the amount. The
// reported venue is mapped back onto our own venue ids so the hop can be
// deduplicated against direct quotes from that venue.
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{AggrError, HopFailure};
use crate::router::routes::Hop;
use crate::token::SwapMode;
use crate::transport::abi::IQuoteAggregator;
use crate::transport::EthCall;
use crate::venues::adapter::{
    contract_address, HopDecimals, HopQuote, PoolKey, VenueAdapter, VenueDescriptor, VenueId,
    VenueKind,
};

pub struct AggregatorAdapter {
    descriptor: VenueDescriptor,
    rpc: Arc<dyn EthCall>,
    contract: Address,
    wrapped_native: Address,
    /// On-chain venue index -> our venue id.
    venue_map: HashMap<u8, VenueId>,
}

impl AggregatorAdapter {
    pub fn new(
        id: VenueId,
        rpc: Arc<dyn EthCall>,
        contract: Address,
        wrapped_native: Address,
        venue_map: HashMap<u8, VenueId>,
    ) -> Self {
        Self {
            descriptor: VenueDescriptor::any_pair(id, VenueKind::Aggregator, vec![PoolKey::Default]),
            rpc,
            contract,
            wrapped_native,
            venue_map,
        }
    }

    async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount: U256,
        mode: SwapMode,
    ) -> Result<IQuoteAggregator::quoteReturn, AggrError> {
        let data = IQuoteAggregator::quoteCall {
            tokenIn: token_in,
            tokenOut: token_out,
            amount,
            exactOut: mode == SwapMode::ExactOut,
        }
        .abi_encode();
        let raw = self.rpc.call(self.contract, data).await?;
        IQuoteAggregator::quoteCall::abi_decode_returns(&raw).map_err(|e| AggrError::Decode(e.to_string()))
    }
}

#[async_trait]
impl VenueAdapter for AggregatorAdapter {
    fn descriptor(&self) -> &VenueDescriptor {
        &self.descriptor
    }

    async fn quote_hop(
        &self,
        hop: &Hop,
        _decimals: HopDecimals,
        amount: U256,
        mode: SwapMode,
    ) -> Result<HopQuote, HopFailure> {
        if hop.token_in.sub_id.is_some() || hop.token_out.sub_id.is_some() {
            return Err(HopFailure::NotFound);
        }
        let token_in = contract_address(&hop.token_in, self.wrapped_native);
        let token_out = contract_address(&hop.token_out, self.wrapped_native);
        if token_in == token_out {
            return Err(HopFailure::NotFound);
        }
        let ret = self.quote(token_in, token_out, amount, mode).await.map_err(|err| {
            let failure = HopFailure::from(err);
            debug!(hop = %hop, reason = failure.reason(), "aggregator quote failed");
            failure
        })?;
        if ret.amount.is_zero() {
            return Err(HopFailure::NotFound);
        }
        let Some(venue) = self.venue_map.get(&ret.venueId) else {
            // An unmapped venue cannot be deduplicated; keep it under our own id.
            warn!(venue_index = ret.venueId, "aggregator reported an unmapped venue");
            return Ok(HopQuote::direct(ret.amount));
        };
        let fee: u32 = ret.poolFee.to();
        Ok(HopQuote {
            amount: ret.amount,
            resolved_venue: Some(venue.clone()),
            resolved_pool: Some(if fee == 0 { PoolKey::Default } else { PoolKey::FeeTier(fee) }),
        })
    }
}
