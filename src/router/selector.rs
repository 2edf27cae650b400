// Route selector - deduplicates quotes and orders them by price
// Two quotes are the same route when their ordered (venue, tokenIn, tokenOut)
// hops match; the better of the two survives. Ordering depends only on the
// set of quotes, never on the order they arrived in.
//
// Numan Thabit 2025 Nov

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::quant::{cmp_ratio, to_display_f64};
use crate::router::routes::{Quote, RankedRoute, RouteLeg};
use crate::token::SwapMode;
use crate::venues::adapter::PoolKey;

/// Fill order between two quotes for the same route, better first. Equal
/// fills fall back to pools, source and hop amounts so the survivor does
/// not depend on arrival order.
fn cmp_fill(a: &Quote, b: &Quote, mode: SwapMode) -> Ordering {
    let by_amount = match mode {
        SwapMode::ExactIn => b.amount_out.cmp(&a.amount_out),
        SwapMode::ExactOut => a.amount_in.cmp(&b.amount_in),
    };
    by_amount
        .then_with(|| pools(a).cmp(&pools(b)))
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.hop_amounts.cmp(&b.hop_amounts))
}

fn pools(quote: &Quote) -> Vec<&PoolKey> {
    quote.path.hops().iter().map(|h| &h.pool).collect()
}

/// Price order, best first: more out per in (EXACT_IN), less in per out
/// (EXACT_OUT). Exact on base units; both sides share the same decimals.
fn cmp_price(a: &Quote, b: &Quote, mode: SwapMode) -> Ordering {
    match mode {
        SwapMode::ExactIn => cmp_ratio(b.amount_out, b.amount_in, a.amount_out, a.amount_in),
        SwapMode::ExactOut => cmp_ratio(a.amount_in, a.amount_out, b.amount_in, b.amount_out),
    }
}

/// Display-unit price for reporting. Lossy.
pub fn effective_price(quote: &Quote, mode: SwapMode) -> f64 {
    let sell = quote.path.sell_token();
    let buy = quote.path.buy_token();
    let amount_in = to_display_f64(quote.amount_in, sell.decimals.unwrap_or(0));
    let amount_out = to_display_f64(quote.amount_out, buy.decimals.unwrap_or(0));
    match mode {
        SwapMode::ExactIn if amount_in > 0.0 => amount_out / amount_in,
        SwapMode::ExactOut if amount_out > 0.0 => amount_in / amount_out,
        _ => 0.0,
    }
}

/// Collapse duplicates and rank. Quotes with a zero amount on either side
/// cannot be priced and are dropped.
pub fn rank_routes(quotes: Vec<Quote>, mode: SwapMode) -> Vec<RankedRoute> {
    let total = quotes.len();
    let mut unique: BTreeMap<Vec<RouteLeg>, Quote> = BTreeMap::new();
    for quote in quotes {
        if quote.amount_in.is_zero() || quote.amount_out.is_zero() {
            continue;
        }
        let key = quote.path.route_key();
        match unique.get(&key) {
            Some(existing) if cmp_fill(&quote, existing, mode) != Ordering::Less => {}
            _ => {
                unique.insert(key, quote);
            }
        }
    }
    if unique.len() < total {
        debug!(before = total, after = unique.len(), "collapsed duplicate routes");
    }

    let mut ordered: Vec<(Vec<RouteLeg>, Quote)> = unique.into_iter().collect();
    ordered.sort_by(|(ka, a), (kb, b)| {
        cmp_price(a, b, mode)
            .then_with(|| a.path.len().cmp(&b.path.len()))
            .then_with(|| ka.cmp(kb))
    });
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (_, quote))| RankedRoute {
            effective_price: effective_price(&quote, mode),
            rank: i + 1,
            quote,
        })
        .collect()
}
