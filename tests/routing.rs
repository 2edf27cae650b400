// End-to-end route queries against in-process venues and decimal sources
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

use route_aggr::control::CancelSignal;
use route_aggr::decimals::{DecimalCache, DecimalResolver, DecimalsSource};
use route_aggr::errors::{CallerInputError, DecimalFailure, HopFailure};
use route_aggr::router::{create_api_router, Hop, RejectReason, RouteRequest, Router, RouterSettings};
use route_aggr::token::{SwapMode, Token, TokenKey};
use route_aggr::venues::amm::{ReservePool, ReservePoolAdapter};
use route_aggr::venues::{HopDecimals, HopQuote, PoolKey, VenueAdapter, VenueDescriptor, VenueId, VenueKind};

fn eth() -> Token {
    Token::native(1, "ETH")
}

fn dai() -> Token {
    Token::erc20(1, Address::repeat_byte(0xda), "DAI")
}

fn usdc() -> Token {
    Token::erc20(1, Address::repeat_byte(0x0c), "USDC")
}

fn units(v: u128, decimals: u32) -> U256 {
    U256::from(v) * U256::from(10u64).pow(U256::from(decimals))
}

/// Decimals by contract address; anything unlisted has no accessor.
struct Registry(HashMap<Address, u8>);

#[async_trait]
impl DecimalsSource for Registry {
    async fn read_decimals(&self, token: &Token) -> Result<u8, DecimalFailure> {
        self.0.get(&token.address).copied().ok_or(DecimalFailure::MissingAccessor)
    }
}

fn resolver() -> DecimalResolver {
    let registry = Registry(HashMap::from([(dai().address, 18), (usdc().address, 6)]));
    DecimalResolver::new(
        Arc::new(registry),
        Arc::new(DecimalCache::default()),
        18,
        Duration::from_millis(200),
    )
}

/// Answers from a fixed (token_in, token_out) table regardless of amount.
struct TableVenue {
    descriptor: VenueDescriptor,
    table: HashMap<(TokenKey, TokenKey), U256>,
    delay: Duration,
    via: Option<VenueId>,
}

impl TableVenue {
    fn new(id: &str) -> Self {
        Self {
            descriptor: VenueDescriptor::any_pair(VenueId::new(id), VenueKind::UniswapV2, vec![PoolKey::Default]),
            table: HashMap::new(),
            delay: Duration::ZERO,
            via: None,
        }
    }

    fn quote(mut self, token_in: &Token, token_out: &Token, amount: U256) -> Self {
        self.table.insert((token_in.key(), token_out.key()), amount);
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn routed_via(mut self, venue: &str) -> Self {
        self.via = Some(VenueId::new(venue));
        self
    }

    fn boxed(self) -> Arc<dyn VenueAdapter> {
        Arc::new(self)
    }
}

#[async_trait]
impl VenueAdapter for TableVenue {
    fn descriptor(&self) -> &VenueDescriptor {
        &self.descriptor
    }

    async fn quote_hop(
        &self,
        hop: &Hop,
        _decimals: HopDecimals,
        _amount: U256,
        _mode: SwapMode,
    ) -> Result<HopQuote, HopFailure> {
        tokio::time::sleep(self.delay).await;
        let amount = self
            .table
            .get(&(hop.token_in.key(), hop.token_out.key()))
            .copied()
            .ok_or(HopFailure::NotFound)?;
        Ok(HopQuote {
            amount,
            resolved_venue: self.via.clone(),
            resolved_pool: None,
        })
    }
}

fn router(adapters: Vec<Arc<dyn VenueAdapter>>, settings: RouterSettings) -> Router {
    Router::new(adapters, resolver(), vec![dai()], settings)
}

fn fast_settings() -> RouterSettings {
    RouterSettings {
        per_call_timeout: Duration::from_millis(100),
        query_timeout: Duration::from_secs(2),
        ..RouterSettings::default()
    }
}

#[tokio::test]
async fn eth_usdc_exact_out_drops_decimal_confused_quote() {
    let good = TableVenue::new("good")
        .quote(&dai(), &usdc(), units(3_106_200, 15))
        .quote(&eth(), &dai(), U256::from(1_005_279_957_266_645_571u128));
    let bad = TableVenue::new("bad").quote(&eth(), &dai(), U256::from(977_427_031_317_218u128));
    let r = router(vec![good.boxed(), bad.boxed()], fast_settings());

    let req = RouteRequest::new(eth(), usdc(), units(3100, 6), SwapMode::ExactOut);
    let resp = r.get_routes(req).await.unwrap();

    let best = resp.best.expect("a plausible route");
    assert_eq!(best.quote.amount_in, U256::from(1_005_279_957_266_645_571u128));
    assert_eq!(best.quote.amount_out, units(3100, 6));
    assert_eq!(best.quote.path.to_string(), "good[default] ETH->DAI | good[default] DAI->USDC");
    assert_eq!(resp.all.len(), 1);
    assert!((best.effective_price - 1.005279957266645571 / 3100.0).abs() < 1e-12);

    let rejected = &resp.diagnostics.rejected;
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].reason, RejectReason::ImplausibleInput);
    assert_eq!(rejected[0].amount_in, Some(U256::from(977_427_031_317_218u128)));
    assert_eq!(rejected[0].source.as_deref(), Some("bad+good"));

    // 2 direct + good->bad + bad->bad
    assert_eq!(resp.diagnostics.hop_failures.not_found, 4);
    assert_eq!(resp.diagnostics.paths_considered, 6);
    assert!(!resp.diagnostics.timed_out);
}

#[tokio::test]
async fn lone_legitimate_quote_survives_when_the_broken_venue_times_out() {
    let good = TableVenue::new("good")
        .quote(&dai(), &usdc(), units(3_106_200, 15))
        .quote(&eth(), &dai(), U256::from(1_005_279_957_266_645_571u128));
    let bad = TableVenue::new("bad")
        .quote(&eth(), &dai(), U256::from(977_427_031_317_218u128))
        .delayed(Duration::from_secs(30));
    let r = router(vec![good.boxed(), bad.boxed()], fast_settings());

    let req = RouteRequest::new(eth(), usdc(), units(3100, 6), SwapMode::ExactOut);
    let resp = r.get_routes(req).await.unwrap();

    let best = resp.best.expect("the good route");
    assert_eq!(best.quote.amount_in, U256::from(1_005_279_957_266_645_571u128));
    assert!(resp.diagnostics.rejected.is_empty());
    assert_eq!(resp.diagnostics.sanity_unchecked, 1);
    assert!(resp.diagnostics.hop_failures.timeout >= 1);
}

#[tokio::test]
async fn stuck_venue_does_not_block_the_query() {
    let snap = TableVenue::new("snap").quote(&eth(), &usdc(), units(3000, 6));
    let stuck = TableVenue::new("stuck")
        .quote(&eth(), &usdc(), units(9000, 6))
        .delayed(Duration::from_secs(30));
    let r = router(vec![snap.boxed(), stuck.boxed()], fast_settings());

    let started = Instant::now();
    let req = RouteRequest::new(eth(), usdc(), units(1, 18), SwapMode::ExactIn).with_max_hops(1);
    let resp = r.get_routes(req).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(resp.all.len(), 1);
    assert_eq!(resp.best.unwrap().quote.amount_out, units(3000, 6));
    assert_eq!(resp.diagnostics.hop_failures.timeout, 1);
    assert!(!resp.diagnostics.timed_out);
}

#[tokio::test]
async fn query_deadline_returns_partial_results() {
    let snap = TableVenue::new("snap").quote(&eth(), &usdc(), units(3000, 6));
    let stuck = TableVenue::new("stuck")
        .quote(&eth(), &usdc(), units(9000, 6))
        .delayed(Duration::from_secs(30));
    let settings = RouterSettings {
        per_call_timeout: Duration::from_secs(10),
        query_timeout: Duration::from_millis(200),
        ..RouterSettings::default()
    };
    let r = router(vec![snap.boxed(), stuck.boxed()], settings);

    let started = Instant::now();
    let req = RouteRequest::new(eth(), usdc(), units(1, 18), SwapMode::ExactIn).with_max_hops(1);
    let resp = r.get_routes(req).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(resp.diagnostics.timed_out);
    assert_eq!(resp.best.unwrap().quote.source, "snap");
}

#[tokio::test]
async fn cancelled_query_returns_nothing() {
    let snap = TableVenue::new("snap").quote(&eth(), &usdc(), units(3000, 6));
    let stuck = TableVenue::new("stuck")
        .quote(&eth(), &usdc(), units(9000, 6))
        .delayed(Duration::from_secs(30));
    let settings = RouterSettings {
        per_call_timeout: Duration::from_secs(10),
        query_timeout: Duration::from_secs(10),
        ..RouterSettings::default()
    };
    let r = router(vec![snap.boxed(), stuck.boxed()], settings);

    let (handle, signal) = CancelSignal::pair();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });
    let req = RouteRequest::new(eth(), usdc(), units(1, 18), SwapMode::ExactIn);
    let out = r.get_routes_with_cancel(req, signal).await.unwrap();
    assert!(out.is_none());
}

#[tokio::test]
async fn no_liquidity_is_an_empty_result() {
    let r = router(vec![TableVenue::new("empty").boxed()], fast_settings());
    let req = RouteRequest::new(eth(), usdc(), units(1, 18), SwapMode::ExactIn);
    let resp = r.get_routes(req).await.unwrap();
    assert!(resp.best.is_none());
    assert!(resp.all.is_empty());
    assert!(resp.diagnostics.rejected.is_empty());
    assert!(resp.diagnostics.hop_failures.not_found > 0);
}

#[tokio::test]
async fn caller_errors_are_the_only_errors() {
    let r = router(vec![TableVenue::new("v").boxed()], fast_settings());
    let zero = RouteRequest::new(eth(), usdc(), U256::ZERO, SwapMode::ExactIn);
    assert!(matches!(r.get_routes(zero).await, Err(CallerInputError::InvalidAmount(_))));

    let hops = RouteRequest::new(eth(), usdc(), U256::from(1u64), SwapMode::ExactIn).with_max_hops(3);
    assert_eq!(r.get_routes(hops).await.unwrap_err(), CallerInputError::InvalidMaxHops(3));

    let mut multi = Token::multi_token(1, Address::repeat_byte(0x77), U256::from(1u64), "POS");
    multi.sub_id = None;
    let req = RouteRequest::new(multi, usdc(), U256::from(1u64), SwapMode::ExactIn);
    assert!(matches!(r.get_routes(req).await, Err(CallerInputError::InvalidToken(_))));
}

#[tokio::test]
async fn unresolvable_buy_token_disqualifies_every_path() {
    let mystery = Token::erc20(1, Address::repeat_byte(0x99), "MYST");
    let venue = TableVenue::new("v").quote(&eth(), &mystery, units(5, 18));
    let r = router(vec![venue.boxed()], fast_settings());
    let req = RouteRequest::new(eth(), mystery.clone(), units(1, 18), SwapMode::ExactIn);
    let resp = r.get_routes(req).await.unwrap();
    assert!(resp.best.is_none());
    assert_eq!(resp.diagnostics.unresolved_tokens, vec![mystery.key()]);
    assert_eq!(resp.diagnostics.rejected.len(), resp.diagnostics.paths_considered);
    assert!(resp
        .diagnostics
        .rejected
        .iter()
        .all(|r| r.reason == RejectReason::DecimalsUnresolved));
}

#[tokio::test]
async fn aggregator_result_dedups_against_direct_venue() {
    let direct = TableVenue::new("uniswap").quote(&eth(), &usdc(), units(3000, 6));
    let aggregator = TableVenue::new("aggregator")
        .quote(&eth(), &usdc(), units(3001, 6))
        .routed_via("uniswap");
    let r = router(vec![direct.boxed(), aggregator.boxed()], fast_settings());
    let req = RouteRequest::new(eth(), usdc(), units(1, 18), SwapMode::ExactIn).with_max_hops(1);
    let resp = r.get_routes(req).await.unwrap();
    assert_eq!(resp.all.len(), 1);
    let best = resp.best.unwrap();
    assert_eq!(best.quote.amount_out, units(3001, 6));
    assert_eq!(best.quote.source, "aggregator>uniswap");
    assert_eq!(best.quote.path.hops()[0].venue, VenueId::new("uniswap"));
}

#[tokio::test]
async fn exact_in_and_exact_out_agree_on_zero_fee_pool() {
    let a = dai();
    let b = Token::erc20(1, Address::repeat_byte(0x1b), "USDS");
    let registry = Registry(HashMap::from([(a.address, 18), (b.address, 18)]));
    let resolver = DecimalResolver::new(
        Arc::new(registry),
        Arc::new(DecimalCache::default()),
        18,
        Duration::from_millis(200),
    );
    let pool = ReservePool {
        name: "dai-usds".into(),
        token_a: a.clone(),
        token_b: b.clone(),
        reserve_a: "1000000".into(),
        reserve_b: "2000000".into(),
        fee_bps: 0,
    };
    let adapter: Arc<dyn VenueAdapter> = Arc::new(ReservePoolAdapter::new(VenueId::new("snap"), vec![pool]));
    let r = Router::new(vec![adapter], resolver, Vec::new(), fast_settings());

    let x = units(3, 18) + U256::from(7u64);
    let forward = r
        .get_routes(RouteRequest::new(a.clone(), b.clone(), x, SwapMode::ExactIn))
        .await
        .unwrap();
    let y = forward.best.unwrap().quote.amount_out;
    assert_eq!(y, U256::from(5_999_982_000_053_999_852u128));

    let backward = r
        .get_routes(RouteRequest::new(a, b, y, SwapMode::ExactOut))
        .await
        .unwrap();
    let x_back = backward.best.unwrap().quote.amount_in;
    let diff = if x_back > x { x_back - x } else { x - x_back };
    assert!(diff <= U256::from(1u64));
}

#[tokio::test]
async fn http_routes_endpoint() {
    let snap = TableVenue::new("snap").quote(&eth(), &usdc(), units(3000, 6));
    let app = create_api_router(Arc::new(router(vec![snap.boxed()], fast_settings())));

    let health = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let body = |amount: &str| {
        serde_json::json!({
            "sell_token": { "chain_id": 1, "address": route_aggr::token::NATIVE_ADDRESS, "symbol": "ETH", "standard": "native" },
            "buy_token": { "chain_id": 1, "address": usdc().address, "symbol": "USDC" },
            "amount": amount,
            "mode": "EXACT_IN",
            "max_hops": 1
        })
        .to_string()
    };
    let post = |json: String| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/routes")
            .header("content-type", "application/json")
            .body(Body::from(json))
            .unwrap()
    };

    let bad = app.clone().oneshot(post(body("-5"))).await.unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let ok = app.oneshot(post(body("1000000000000000000"))).await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(ok.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["best"]["amount_out"], "3000000000");
    assert_eq!(json["best"]["amount_out_display"], "3000");
    assert_eq!(json["best"]["rank"], 1);
    assert_eq!(json["diagnostics"]["timed_out"], false);
}
