// Contract interfaces used for read-only quote calls
//
// Numan Thabit 2025 Nov

use alloy_sol_types::sol;

sol! {
    /// ERC-20 metadata accessor.
    interface IERC20Metadata {
        function decimals() external view returns (uint8);
    }

    /// ERC-6909 multi-token metadata accessor, one precision per id.
    interface IERC6909Metadata {
        function decimals(uint256 id) external view returns (uint8);
    }

    /// Uniswap-V2-style router. Reverts when a pair in the path does not exist.
    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
        function getAmountsIn(uint256 amountOut, address[] calldata path) external view returns (uint256[] memory amounts);
    }

    /// Uniswap-V3 Quoter (v1 signatures). Meant to be called with eth_call only.
    interface IQuoter {
        function quoteExactInputSingle(address tokenIn, address tokenOut, uint24 fee, uint256 amountIn, uint160 sqrtPriceLimitX96) external returns (uint256 amountOut);
        function quoteExactOutputSingle(address tokenIn, address tokenOut, uint24 fee, uint256 amountOut, uint160 sqrtPriceLimitX96) external returns (uint256 amountIn);
    }

    /// Singleton aggregator that quotes across its underlying venues in one
    /// call and reports which one it picked.
    interface IQuoteAggregator {
        function quote(address tokenIn, address tokenOut, uint256 amount, bool exactOut) external view returns (uint256 amount, uint8 venueId, uint24 poolFee);
    }
}
