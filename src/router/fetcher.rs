// Quote fetching
// Prices every enumerated path concurrently. Hops of one path are quoted in
// order (forward for EXACT_IN, backward from the buy side for EXACT_OUT);
// paths are independent of each other. Each hop call has its own timeout and
// the whole fan-out is bounded by the query deadline. Hop failures drop the
// path and are tallied, never raised.
//
// Numan Thabit 2025 Nov

use alloy_primitives::U256;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::control::{AdmissionControl, CancelSignal, CircuitBreakers};
use crate::errors::HopFailure;
use crate::metrics::HOP_FAILURES;
use crate::router::routes::{Hop, HopFailureCounts, Path, Quote};
use crate::token::{SwapMode, TokenKey};
use crate::venues::adapter::{HopDecimals, HopQuote, VenueAdapter, VenueId};

pub type AdapterMap = HashMap<VenueId, Arc<dyn VenueAdapter>>;

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub quotes: Vec<Quote>,
    pub hop_failures: HopFailureCounts,
    /// The query deadline elapsed with paths still in flight.
    pub timed_out: bool,
}

#[derive(Clone)]
pub struct QuoteFetcher {
    adapters: Arc<AdapterMap>,
    admission: AdmissionControl,
    breakers: CircuitBreakers,
    per_call_timeout: Duration,
    query_timeout: Duration,
}

impl QuoteFetcher {
    pub fn new(
        adapters: Arc<AdapterMap>,
        admission: AdmissionControl,
        breakers: CircuitBreakers,
        per_call_timeout: Duration,
        query_timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            admission,
            breakers,
            per_call_timeout,
            query_timeout,
        }
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Quote every path. `None` when cancelled; otherwise whatever
    /// completed within the query timeout, in no particular order.
    pub async fn fetch_quotes(
        &self,
        paths: Vec<Path>,
        amount: U256,
        mode: SwapMode,
        decimals: Arc<HashMap<TokenKey, u8>>,
        cancel: &mut CancelSignal,
    ) -> Option<FetchOutcome> {
        let deadline = Instant::now() + self.query_timeout;
        self.fetch_quotes_until(paths, amount, mode, decimals, deadline, cancel)
            .await
    }

    /// As `fetch_quotes`, against a deadline the caller already started.
    pub async fn fetch_quotes_until(
        &self,
        paths: Vec<Path>,
        amount: U256,
        mode: SwapMode,
        decimals: Arc<HashMap<TokenKey, u8>>,
        deadline: Instant,
        cancel: &mut CancelSignal,
    ) -> Option<FetchOutcome> {
        if cancel.is_cancelled() {
            return None;
        }
        let mut outcome = FetchOutcome::default();
        let mut set = JoinSet::new();
        for path in paths {
            let fetcher = self.clone();
            let decimals = decimals.clone();
            set.spawn(async move { fetcher.price_path(path, amount, mode, &decimals).await });
        }

        let deadline = tokio::time::sleep_until(deadline);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    set.abort_all();
                    debug!("quote fetch cancelled");
                    return None;
                }
                _ = &mut deadline => {
                    outcome.timed_out = !set.is_empty();
                    if outcome.timed_out {
                        warn!(pending = set.len(), "query deadline reached, keeping partial results");
                    }
                    set.abort_all();
                    break;
                }
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(quote))) => outcome.quotes.push(quote),
                    Some(Ok(Err((venue, failure)))) => {
                        HOP_FAILURES
                            .with_label_values(&[venue.as_str(), failure.reason()])
                            .inc();
                        outcome.hop_failures.record(&failure);
                    }
                    Some(Err(e)) => warn!(error = %e, "quote task failed"),
                },
            }
        }
        Some(outcome)
    }

    async fn price_path(
        &self,
        mut path: Path,
        amount: U256,
        mode: SwapMode,
        decimals: &HashMap<TokenKey, u8>,
    ) -> Result<Quote, (VenueId, HopFailure)> {
        let n = path.len();
        let mut amounts = vec![U256::ZERO; n + 1];
        let mut resolved: Vec<Option<HopQuote>> = vec![None; n];
        let order: Vec<usize> = match mode {
            SwapMode::ExactIn => {
                amounts[0] = amount;
                (0..n).collect()
            }
            SwapMode::ExactOut => {
                amounts[n] = amount;
                (0..n).rev().collect()
            }
        };
        for i in order {
            let hop = &path.hops()[i];
            let given = match mode {
                SwapMode::ExactIn => amounts[i],
                SwapMode::ExactOut => amounts[i + 1],
            };
            let quote = self
                .quote_hop(hop, given, mode, decimals)
                .await
                .map_err(|f| (hop.venue.clone(), f))?;
            match mode {
                SwapMode::ExactIn => amounts[i + 1] = quote.amount,
                SwapMode::ExactOut => amounts[i] = quote.amount,
            }
            resolved[i] = Some(quote);
        }

        let mut sources = Vec::with_capacity(n);
        for (hop, quote) in path.hops_mut().iter_mut().zip(resolved) {
            // Stamp the resolved precision so the quote prices itself.
            hop.token_in.decimals = decimals.get(&hop.token_in.key()).copied();
            hop.token_out.decimals = decimals.get(&hop.token_out.key()).copied();
            let Some(quote) = quote else { continue };
            match quote.resolved_venue {
                Some(venue) => {
                    sources.push(format!("{}>{}", hop.venue, venue));
                    hop.venue = venue;
                    if let Some(pool) = quote.resolved_pool {
                        hop.pool = pool;
                    }
                }
                None => sources.push(hop.venue.to_string()),
            }
        }
        Ok(Quote {
            amount_in: amounts[0],
            amount_out: amounts[n],
            hop_amounts: amounts,
            source: sources.join("+"),
            path,
        })
    }

    async fn quote_hop(
        &self,
        hop: &Hop,
        amount: U256,
        mode: SwapMode,
        decimals: &HashMap<TokenKey, u8>,
    ) -> Result<HopQuote, HopFailure> {
        let adapter = self.adapters.get(&hop.venue).ok_or(HopFailure::NotFound)?;
        // Fail closed: an adapter never sees a guessed precision.
        let hop_decimals = match (decimals.get(&hop.token_in.key()), decimals.get(&hop.token_out.key())) {
            (Some(&token_in), Some(&token_out)) => HopDecimals { token_in, token_out },
            _ => return Err(HopFailure::DecimalsUnknown),
        };
        let venue = hop.venue.as_str();
        if self.breakers.is_open(venue).await {
            return Err(HopFailure::CircuitOpen);
        }
        let _permit = self
            .admission
            .acquire()
            .await
            .ok_or_else(|| HopFailure::Transport("admission closed".into()))?;

        let result = match tokio::time::timeout(
            self.per_call_timeout,
            adapter.quote_hop(hop, hop_decimals, amount, mode),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(HopFailure::Timeout),
        };
        match &result {
            Err(failure) if failure.counts_against_venue() => self.breakers.record_failure(venue).await,
            _ => self.breakers.record_success(venue).await,
        }
        if let Err(failure) = &result {
            debug!(hop = %hop, reason = failure.reason(), "hop produced no quote");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;
    use crate::venues::adapter::{PoolKey, VenueDescriptor, VenueKind};
    use alloy_primitives::Address;
    use async_trait::async_trait;

    /// Multiplies (EXACT_IN) or divides (EXACT_OUT) by a fixed rate.
    struct Fixed {
        descriptor: VenueDescriptor,
        rate: u64,
        delay: Duration,
        via: Option<VenueId>,
    }

    impl Fixed {
        fn new(id: &str, rate: u64) -> Self {
            Self {
                descriptor: VenueDescriptor::any_pair(VenueId::new(id), VenueKind::UniswapV2, vec![PoolKey::Default]),
                rate,
                delay: Duration::ZERO,
                via: None,
            }
        }
    }

    #[async_trait]
    impl VenueAdapter for Fixed {
        fn descriptor(&self) -> &VenueDescriptor {
            &self.descriptor
        }

        async fn quote_hop(
            &self,
            _hop: &Hop,
            _decimals: HopDecimals,
            amount: U256,
            mode: SwapMode,
        ) -> Result<HopQuote, HopFailure> {
            tokio::time::sleep(self.delay).await;
            let rate = U256::from(self.rate);
            let amount = match mode {
                SwapMode::ExactIn => amount * rate,
                SwapMode::ExactOut => (amount + rate - U256::from(1u64)) / rate,
            };
            Ok(HopQuote {
                amount,
                resolved_venue: self.via.clone(),
                resolved_pool: self.via.as_ref().map(|_| PoolKey::FeeTier(500)),
            })
        }
    }

    fn tok(b: u8, sym: &str) -> Token {
        Token::erc20(1, Address::repeat_byte(b), sym)
    }

    fn fetcher(adapters: Vec<Fixed>, per_call: Duration, query: Duration) -> QuoteFetcher {
        let map: AdapterMap = adapters
            .into_iter()
            .map(|a| (a.descriptor.id.clone(), Arc::new(a) as Arc<dyn VenueAdapter>))
            .collect();
        QuoteFetcher::new(
            Arc::new(map),
            AdmissionControl::new(8, None),
            CircuitBreakers::new(),
            per_call,
            query,
        )
    }

    fn two_hop(a: &Token, b: &Token, c: &Token, v1: &str, v2: &str) -> Path {
        Path::new(vec![
            Hop::new(VenueId::new(v1), a.clone(), b.clone(), PoolKey::Default),
            Hop::new(VenueId::new(v2), b.clone(), c.clone(), PoolKey::Default),
        ])
        .unwrap()
    }

    fn decimals(tokens: &[&Token]) -> Arc<HashMap<TokenKey, u8>> {
        Arc::new(tokens.iter().map(|t| (t.key(), 18)).collect())
    }

    #[tokio::test]
    async fn exact_out_solves_backwards() {
        let (a, b, c) = (tok(1, "A"), tok(2, "B"), tok(3, "C"));
        let f = fetcher(vec![Fixed::new("x2", 2), Fixed::new("x5", 5)], Duration::from_secs(1), Duration::from_secs(2));
        let path = two_hop(&a, &b, &c, "x2", "x5");
        let out = f
            .fetch_quotes(vec![path], U256::from(100u64), SwapMode::ExactOut, decimals(&[&a, &b, &c]), &mut CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(out.quotes.len(), 1);
        let q = &out.quotes[0];
        assert_eq!(q.hop_amounts, vec![U256::from(10u64), U256::from(20u64), U256::from(100u64)]);
        assert_eq!(q.amount_in, U256::from(10u64));
        assert_eq!(q.source, "x2+x5");
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn missing_decimals_fail_closed() {
        let (a, b, c) = (tok(1, "A"), tok(2, "B"), tok(3, "C"));
        let f = fetcher(vec![Fixed::new("x2", 2)], Duration::from_secs(1), Duration::from_secs(2));
        let out = f
            .fetch_quotes(vec![two_hop(&a, &b, &c, "x2", "x2")], U256::from(1u64), SwapMode::ExactIn, decimals(&[&a, &b]), &mut CancelSignal::never())
            .await
            .unwrap();
        assert!(out.quotes.is_empty());
        assert_eq!(out.hop_failures.decimals_unknown, 1);
    }

    #[tokio::test]
    async fn slow_hops_time_out_without_blocking_others() {
        let (a, b) = (tok(1, "A"), tok(2, "B"));
        let mut slow = Fixed::new("slow", 3);
        slow.delay = Duration::from_secs(5);
        let f = fetcher(vec![Fixed::new("fast", 2), slow], Duration::from_millis(50), Duration::from_secs(2));
        let paths = ["fast", "slow"]
            .iter()
            .map(|v| Path::new(vec![Hop::new(VenueId::new(*v), a.clone(), b.clone(), PoolKey::Default)]).unwrap())
            .collect();
        let out = f
            .fetch_quotes(paths, U256::from(7u64), SwapMode::ExactIn, decimals(&[&a, &b]), &mut CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(out.quotes.len(), 1);
        assert_eq!(out.quotes[0].amount_out, U256::from(14u64));
        assert_eq!(out.hop_failures.timeout, 1);
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn query_deadline_keeps_partial_results() {
        let (a, b) = (tok(1, "A"), tok(2, "B"));
        let mut slow = Fixed::new("slow", 3);
        slow.delay = Duration::from_secs(5);
        let f = fetcher(vec![Fixed::new("fast", 2), slow], Duration::from_secs(10), Duration::from_millis(100));
        let paths = ["fast", "slow"]
            .iter()
            .map(|v| Path::new(vec![Hop::new(VenueId::new(*v), a.clone(), b.clone(), PoolKey::Default)]).unwrap())
            .collect();
        let out = f
            .fetch_quotes(paths, U256::from(7u64), SwapMode::ExactIn, decimals(&[&a, &b]), &mut CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(out.quotes.len(), 1);
        assert!(out.timed_out);
    }

    #[tokio::test]
    async fn cancellation_discards_everything() {
        let (a, b) = (tok(1, "A"), tok(2, "B"));
        let mut slow = Fixed::new("slow", 3);
        slow.delay = Duration::from_secs(5);
        let f = fetcher(vec![slow], Duration::from_secs(10), Duration::from_secs(10));
        let path = Path::new(vec![Hop::new(VenueId::new("slow"), a.clone(), b.clone(), PoolKey::Default)]).unwrap();
        let (handle, mut signal) = CancelSignal::pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            handle.cancel();
        });
        let out = f
            .fetch_quotes(vec![path], U256::from(7u64), SwapMode::ExactIn, decimals(&[&a, &b]), &mut signal)
            .await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn resolved_venue_rewrites_hop() {
        let (a, b) = (tok(1, "A"), tok(2, "B"));
        let mut agg = Fixed::new("aggregator", 2);
        agg.via = Some(VenueId::new("uniswap-v3"));
        let f = fetcher(vec![agg], Duration::from_secs(1), Duration::from_secs(2));
        let path = Path::new(vec![Hop::new(VenueId::new("aggregator"), a.clone(), b.clone(), PoolKey::Default)]).unwrap();
        let out = f
            .fetch_quotes(vec![path], U256::from(7u64), SwapMode::ExactIn, decimals(&[&a, &b]), &mut CancelSignal::never())
            .await
            .unwrap();
        let q = &out.quotes[0];
        assert_eq!(q.source, "aggregator>uniswap-v3");
        assert_eq!(q.path.hops()[0].venue, VenueId::new("uniswap-v3"));
        assert_eq!(q.path.hops()[0].pool, PoolKey::FeeTier(500));
    }
}
