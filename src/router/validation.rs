// Quote sanity filter
// Drops EXACT_OUT quotes whose required input is implausibly small for the
// requested output. Such quotes come from adapters that mixed up decimal
// bases and would be ranked best if left in.
//
// Numan Thabit 2025 Nov

use alloy_primitives::U256;
use tracing::{debug, warn};

use crate::metrics::SANITY_REJECTIONS;
use crate::quant::{exceeds_display, to_display_f64, wide, Wide};
use crate::router::routes::{Quote, RejectReason, RejectedPath};
use crate::token::SwapMode;

/// Required input may be at most this many times cheaper than the output.
pub const IMPLAUSIBLE_RATIO: u64 = 100;

/// Outputs at or below this many buy-token display units are never checked.
pub const DUST_GUARD_UNITS: u64 = 100;

/// What the filter needs to know about the query.
#[derive(Debug, Clone, Copy)]
pub struct SanityContext {
    pub sell_decimals: u8,
    pub buy_decimals: u8,
    /// Sell-token display units per buy-token display unit.
    pub reference_price: Option<f64>,
}

/// How the requested output is expressed in sell-token units.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Reference {
    Price(f64),
    /// Upper median of the batch's required inputs (base units).
    BatchMedian(U256),
}

impl Reference {
    /// `None` for a lone quote without a caller price: there is nothing to
    /// compare it against.
    fn pick(quotes: &[Quote], ctx: &SanityContext) -> Option<Self> {
        if let Some(price) = ctx.reference_price {
            return Some(Reference::Price(price));
        }
        if quotes.len() < 2 {
            return None;
        }
        let mut inputs: Vec<U256> = quotes.iter().map(|q| q.amount_in).collect();
        inputs.sort_unstable();
        Some(Reference::BatchMedian(inputs[inputs.len() / 2]))
    }

    fn implausible(&self, quote: &Quote, ctx: &SanityContext) -> bool {
        match *self {
            Reference::Price(price) => {
                let input = to_display_f64(quote.amount_in, ctx.sell_decimals);
                let output = to_display_f64(quote.amount_out, ctx.buy_decimals);
                input * (IMPLAUSIBLE_RATIO as f64) < output * price
            }
            Reference::BatchMedian(median) => {
                wide(quote.amount_in) * Wide::from(IMPLAUSIBLE_RATIO) < wide(median)
            }
        }
    }
}

fn guarded(quote: &Quote, ctx: &SanityContext) -> bool {
    exceeds_display(quote.amount_out, ctx.buy_decimals, DUST_GUARD_UNITS)
}

/// Quotes that would be checked but have no reference to be checked
/// against. They pass `filter_valid` unchanged.
pub fn unchecked_count(quotes: &[Quote], mode: SwapMode, ctx: &SanityContext) -> usize {
    if mode == SwapMode::ExactIn || Reference::pick(quotes, ctx).is_some() {
        return 0;
    }
    quotes.iter().filter(|q| guarded(q, ctx)).count()
}

/// Split quotes into plausible and rejected. EXACT_IN quotes and outputs
/// under the dust guard pass unchanged.
pub fn filter_valid(quotes: Vec<Quote>, mode: SwapMode, ctx: &SanityContext) -> (Vec<Quote>, Vec<RejectedPath>) {
    if mode == SwapMode::ExactIn {
        return (quotes, Vec::new());
    }
    let Some(reference) = Reference::pick(&quotes, ctx) else {
        debug!(quotes = quotes.len(), "no reference rate, plausibility unchecked");
        return (quotes, Vec::new());
    };
    let mut kept = Vec::with_capacity(quotes.len());
    let mut rejected = Vec::new();
    for quote in quotes {
        if !guarded(&quote, ctx) || !reference.implausible(&quote, ctx) {
            kept.push(quote);
            continue;
        }
        warn!(
            path = %quote.path,
            source = %quote.source,
            amount_in = %quote.amount_in,
            amount_out = %quote.amount_out,
            reference = ?reference,
            "rejecting implausible quote"
        );
        SANITY_REJECTIONS.with_label_values(&[quote.source.as_str()]).inc();
        rejected.push(RejectedPath {
            reason: RejectReason::ImplausibleInput,
            source: Some(quote.source),
            amount_in: Some(quote.amount_in),
            amount_out: Some(quote.amount_out),
            path: quote.path,
        });
    }
    (kept, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::routes::{Hop, Path};
    use crate::token::Token;
    use crate::venues::adapter::{PoolKey, VenueId};
    use alloy_primitives::Address;

    fn quote(venue: &str, amount_in: u128, amount_out: u128) -> Quote {
        let hop = Hop::new(
            VenueId::new(venue),
            Token::native(1, "ETH"),
            Token::erc20(1, Address::repeat_byte(0xaa), "USDC"),
            PoolKey::Default,
        );
        Quote {
            path: Path::new(vec![hop]).unwrap(),
            amount_in: U256::from(amount_in),
            amount_out: U256::from(amount_out),
            hop_amounts: vec![U256::from(amount_in), U256::from(amount_out)],
            source: venue.to_string(),
        }
    }

    const SAME: SanityContext = SanityContext {
        sell_decimals: 6,
        buy_decimals: 6,
        reference_price: None,
    };

    #[test]
    fn thousandth_of_output_is_rejected_against_the_batch() {
        let out = 5_000_000_000u128; // 5000 units
        let quotes = vec![quote("bad", out / 1000, out), quote("ok", out + 17, out)];
        let (kept, rejected) = filter_valid(quotes, SwapMode::ExactOut, &SAME);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, "ok");
        assert_eq!(rejected[0].reason, RejectReason::ImplausibleInput);
        assert_eq!(rejected[0].source.as_deref(), Some("bad"));
    }

    #[test]
    fn lone_cross_priced_quote_is_kept_without_reference() {
        let ctx = SanityContext {
            sell_decimals: 18,
            buy_decimals: 6,
            reference_price: None,
        };
        let quotes = vec![quote("good", 1_005_279_957_266_645_571, 3_100_000_000)];
        assert_eq!(unchecked_count(&quotes, SwapMode::ExactOut, &ctx), 1);
        let (kept, rejected) = filter_valid(quotes, SwapMode::ExactOut, &ctx);
        assert_eq!(kept.len(), 1);
        assert!(rejected.is_empty());
    }

    #[test]
    fn eth_usdc_scenario_uses_batch_median() {
        let ctx = SanityContext {
            sell_decimals: 18,
            buy_decimals: 6,
            reference_price: None,
        };
        let out = 3_100_000_000u128;
        let quotes = vec![
            quote("broken", 977_427_031_317_218, out),
            quote("good", 1_005_279_957_266_645_571, out),
        ];
        let (kept, rejected) = filter_valid(quotes, SwapMode::ExactOut, &ctx);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, "good");
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].amount_in, Some(U256::from(977_427_031_317_218u128)));
    }

    #[test]
    fn reference_price_catches_a_lone_bad_quote() {
        // ~3084 USDC per ETH
        let ctx = SanityContext {
            sell_decimals: 18,
            buy_decimals: 6,
            reference_price: Some(1.0 / 3084.0),
        };
        let out = 3_100_000_000u128;
        let (kept, _) = filter_valid(vec![quote("broken", 977_427_031_317_218, out)], SwapMode::ExactOut, &ctx);
        assert!(kept.is_empty());
        let (kept, _) = filter_valid(vec![quote("good", 1_005_279_957_266_645_571, out)], SwapMode::ExactOut, &ctx);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn dust_outputs_and_exact_in_pass() {
        let small = 100_000_000u128; // exactly 100 units, not above the guard
        let batch = vec![quote("tiny", 1, small), quote("fair", small + 1, small)];
        let (kept, _) = filter_valid(batch, SwapMode::ExactOut, &SAME);
        assert_eq!(kept.len(), 2);

        let (kept, rejected) = filter_valid(vec![quote("any", 1, 10u128.pow(12))], SwapMode::ExactIn, &SAME);
        assert_eq!(kept.len(), 1);
        assert!(rejected.is_empty());
    }
}
