// Uniswap-style venue adapters
// V2 quotes go through the router's getAmountsOut/getAmountsIn over a two
// token path; V3 quotes go through the Quoter, one call per fee tier
//
// Numan Thabit 2025 Nov

use alloy_primitives::aliases::{U160, U24};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::errors::{AggrError, HopFailure};
use crate::router::routes::Hop;
use crate::token::SwapMode;
use crate::transport::abi::{IQuoter, IUniswapV2Router02};
use crate::transport::EthCall;
use crate::venues::adapter::{
    contract_address, HopDecimals, HopQuote, PairSupport, PoolKey, VenueAdapter, VenueDescriptor,
    VenueId, VenueKind,
};

/// Map a call result onto the hop outcome: reverts and zero amounts mean the
/// pool does not exist (or cannot fill), everything else is transport.
fn settle(hop: &Hop, result: Result<U256, AggrError>) -> Result<HopQuote, HopFailure> {
    match result {
        Ok(amount) if amount.is_zero() => Err(HopFailure::NotFound),
        Ok(amount) => Ok(HopQuote::direct(amount)),
        Err(err) => {
            let failure = HopFailure::from(err);
            debug!(hop = %hop, reason = failure.reason(), "hop quote failed");
            Err(failure)
        }
    }
}

fn decode_err(e: alloy_sol_types::Error) -> AggrError {
    AggrError::Decode(e.to_string())
}

pub struct UniswapV2Adapter {
    descriptor: VenueDescriptor,
    rpc: Arc<dyn EthCall>,
    router: Address,
    wrapped_native: Address,
}

impl UniswapV2Adapter {
    pub fn new(id: VenueId, rpc: Arc<dyn EthCall>, router: Address, wrapped_native: Address) -> Self {
        Self::with_support(id, rpc, router, wrapped_native, PairSupport::Any(vec![PoolKey::Default]))
    }

    pub fn with_support(
        id: VenueId,
        rpc: Arc<dyn EthCall>,
        router: Address,
        wrapped_native: Address,
        support: PairSupport,
    ) -> Self {
        Self {
            descriptor: VenueDescriptor {
                id,
                kind: VenueKind::UniswapV2,
                support,
            },
            rpc,
            router,
            wrapped_native,
        }
    }

    async fn amounts(&self, path: Vec<Address>, amount: U256, mode: SwapMode) -> Result<U256, AggrError> {
        let amounts = match mode {
            SwapMode::ExactIn => {
                let data = IUniswapV2Router02::getAmountsOutCall { amountIn: amount, path }.abi_encode();
                let raw = self.rpc.call(self.router, data).await?;
                IUniswapV2Router02::getAmountsOutCall::abi_decode_returns(&raw).map_err(decode_err)?
            }
            SwapMode::ExactOut => {
                let data = IUniswapV2Router02::getAmountsInCall { amountOut: amount, path }.abi_encode();
                let raw = self.rpc.call(self.router, data).await?;
                IUniswapV2Router02::getAmountsInCall::abi_decode_returns(&raw).map_err(decode_err)?
            }
        };
        if amounts.len() != 2 {
            return Err(AggrError::Decode(format!("expected 2 amounts, got {}", amounts.len())));
        }
        Ok(match mode {
            SwapMode::ExactIn => amounts[1],
            SwapMode::ExactOut => amounts[0],
        })
    }
}

#[async_trait]
impl VenueAdapter for UniswapV2Adapter {
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
            // native <-> wrapped is a wrap, not a swap
            return Err(HopFailure::NotFound);
        }
        settle(hop, self.amounts(vec![token_in, token_out], amount, mode).await)
    }
}

/// Fee tiers deployed on every Uniswap V3 factory.
pub const DEFAULT_FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

pub struct UniswapV3Adapter {
    descriptor: VenueDescriptor,
    rpc: Arc<dyn EthCall>,
    quoter: Address,
    wrapped_native: Address,
}

impl UniswapV3Adapter {
    pub fn new(
        id: VenueId,
        rpc: Arc<dyn EthCall>,
        quoter: Address,
        wrapped_native: Address,
        fee_tiers: &[u32],
    ) -> Self {
        let pools = fee_tiers.iter().copied().map(PoolKey::FeeTier).collect();
        Self {
            descriptor: VenueDescriptor::any_pair(id, VenueKind::UniswapV3, pools),
            rpc,
            quoter,
            wrapped_native,
        }
    }

    async fn quote_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount: U256,
        mode: SwapMode,
    ) -> Result<U256, AggrError> {
        let fee = U24::from(fee);
        match mode {
            SwapMode::ExactIn => {
                let data = IQuoter::quoteExactInputSingleCall {
                    tokenIn: token_in,
                    tokenOut: token_out,
                    fee,
                    amountIn: amount,
                    sqrtPriceLimitX96: U160::ZERO,
                }
                .abi_encode();
                let raw = self.rpc.call(self.quoter, data).await?;
                IQuoter::quoteExactInputSingleCall::abi_decode_returns(&raw).map_err(decode_err)
            }
            SwapMode::ExactOut => {
                let data = IQuoter::quoteExactOutputSingleCall {
                    tokenIn: token_in,
                    tokenOut: token_out,
                    fee,
                    amountOut: amount,
                    sqrtPriceLimitX96: U160::ZERO,
                }
                .abi_encode();
                let raw = self.rpc.call(self.quoter, data).await?;
                IQuoter::quoteExactOutputSingleCall::abi_decode_returns(&raw).map_err(decode_err)
            }
        }
    }
}

#[async_trait]
impl VenueAdapter for UniswapV3Adapter {
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
        let PoolKey::FeeTier(fee) = hop.pool else {
            return Err(HopFailure::NotFound);
        };
        if fee >= 1 << 24 || hop.token_in.sub_id.is_some() || hop.token_out.sub_id.is_some() {
            return Err(HopFailure::NotFound);
        }
        let token_in = contract_address(&hop.token_in, self.wrapped_native);
        let token_out = contract_address(&hop.token_out, self.wrapped_native);
        if token_in == token_out {
            return Err(HopFailure::NotFound);
        }
        settle(hop, self.quote_single(token_in, token_out, fee, amount, mode).await)
    }
}
