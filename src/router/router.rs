// Route query entry point and HTTP API
// This file ties decimal resolution, path enumeration, quote fetching, the
// sanity filter and ranking into a single query, and exposes it over HTTP
//
// Numan Thabit 2025 Nov

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router as AxumRouter,
};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::control::{AdmissionControl, BreakerSettings, CancelSignal, CircuitBreakers};
use crate::decimals::DecimalResolver;
use crate::errors::CallerInputError;
use crate::metrics::{QUERY_LATENCY, ROUTE_QUERIES};
use crate::quant::{format_units, parse_amount};
use crate::router::fetcher::{AdapterMap, QuoteFetcher};
use crate::router::paths::enumerate_paths;
use crate::router::routes::{
    Diagnostics, HopFailureCounts, RankedRoute, RejectReason, RejectedPath, RouteRequest,
    RouteResponse,
};
use crate::router::selector::rank_routes;
use crate::router::validation::{filter_valid, unchecked_count, SanityContext};
use crate::token::{SwapMode, Token, TokenKey};
use crate::venues::adapter::{VenueAdapter, VenueDescriptor};

#[derive(Debug, Clone, Copy)]
pub struct RouterSettings {
    pub per_call_timeout: Duration,
    pub query_timeout: Duration,
    pub max_inflight: usize,
    /// Hop calls started per second across all queries; unbounded if `None`.
    pub rate_per_sec: Option<u32>,
    pub breakers: BreakerSettings,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            per_call_timeout: Duration::from_millis(1500),
            query_timeout: Duration::from_millis(4000),
            max_inflight: 32,
            rate_per_sec: None,
            breakers: BreakerSettings::default(),
        }
    }
}

/// Answers route queries over a fixed set of venues.
pub struct Router {
    venues: Vec<VenueDescriptor>,
    fetcher: QuoteFetcher,
    resolver: DecimalResolver,
    intermediates: Vec<Token>,
}

impl Router {
    pub fn new(
        adapters: Vec<Arc<dyn VenueAdapter>>,
        resolver: DecimalResolver,
        intermediates: Vec<Token>,
        settings: RouterSettings,
    ) -> Self {
        let mut venues = Vec::with_capacity(adapters.len());
        let mut map: AdapterMap = HashMap::with_capacity(adapters.len());
        for adapter in adapters {
            let id = adapter.id().clone();
            if map.contains_key(&id) {
                warn!(venue = %id, "duplicate venue id; keeping the first adapter");
                continue;
            }
            venues.push(adapter.descriptor().clone());
            map.insert(id, adapter);
        }
        let fetcher = QuoteFetcher::new(
            Arc::new(map),
            AdmissionControl::new(settings.max_inflight, settings.rate_per_sec),
            CircuitBreakers::with_settings(settings.breakers),
            settings.per_call_timeout,
            settings.query_timeout,
        );
        Self {
            venues,
            fetcher,
            resolver,
            intermediates,
        }
    }

    pub fn venues(&self) -> &[VenueDescriptor] {
        &self.venues
    }

    pub fn resolver(&self) -> &DecimalResolver {
        &self.resolver
    }

    /// Run a query to completion.
    pub async fn get_routes(&self, req: RouteRequest) -> Result<RouteResponse, CallerInputError> {
        let resp = self.get_routes_with_cancel(req, CancelSignal::never()).await?;
        Ok(resp.unwrap_or_default())
    }

    /// Run a query that may be abandoned. `Ok(None)` means it was cancelled
    /// and nothing gathered so far is returned.
    #[tracing::instrument(
        skip_all,
        fields(
            sell = %req.sell_token.label(),
            buy = %req.buy_token.label(),
            amount = %req.amount,
            mode = req.mode.as_str(),
        )
    )]
    pub async fn get_routes_with_cancel(
        &self,
        req: RouteRequest,
        mut cancel: CancelSignal,
    ) -> Result<Option<RouteResponse>, CallerInputError> {
        let started = Instant::now();
        let max_hops = match req.validate() {
            Ok(h) => h,
            Err(e) => {
                ROUTE_QUERIES.with_label_values(&["caller_error"]).inc();
                return Err(e);
            }
        };
        let result = self.run_query(&req, max_hops, &mut cancel).await;
        QUERY_LATENCY.observe(started.elapsed().as_secs_f64());

        let outcome = match &result {
            None => "cancelled",
            Some(r) if r.diagnostics.timed_out => "partial",
            Some(r) if r.best.is_none() => "empty",
            Some(_) => "ok",
        };
        ROUTE_QUERIES.with_label_values(&[outcome]).inc();
        match &result {
            Some(r) => info!(
                outcome,
                routes = r.all.len(),
                rejected = r.diagnostics.rejected.len(),
                hop_failures = r.diagnostics.hop_failures.total(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "route query finished"
            ),
            None => info!(outcome, "route query cancelled"),
        }
        Ok(result)
    }

    async fn run_query(&self, req: &RouteRequest, max_hops: u8, cancel: &mut CancelSignal) -> Option<RouteResponse> {
        // One deadline covers decimal resolution and quoting.
        let deadline = tokio::time::Instant::now() + self.fetcher.query_timeout();
        let chain_id = req.sell_token.chain_id;
        let intermediates: Vec<Token> = req
            .allowed_intermediates
            .as_ref()
            .unwrap_or(&self.intermediates)
            .iter()
            .filter(|t| t.chain_id == chain_id)
            .cloned()
            .collect();
        let paths = enumerate_paths(&req.sell_token, &req.buy_token, &intermediates, max_hops, &self.venues);
        let mut diagnostics = Diagnostics {
            paths_considered: paths.len(),
            ..Diagnostics::default()
        };
        debug!(paths = paths.len(), "enumerated candidate paths");

        // Resolve only what the paths touch, sell and buy first.
        let mut tokens = vec![req.sell_token.clone(), req.buy_token.clone()];
        let mut seen: BTreeSet<TokenKey> = tokens.iter().map(Token::key).collect();
        for token in paths.iter().flat_map(|p| p.tokens()) {
            if seen.insert(token.key()) {
                tokens.push(token.clone());
            }
        }
        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            r = tokio::time::timeout_at(deadline, self.resolver.resolve_decimals(&tokens)) => match r {
                Ok(resolved) => resolved,
                Err(_) => {
                    warn!(tokens = tokens.len(), "query deadline reached while resolving decimals");
                    diagnostics.timed_out = true;
                    return Some(RouteResponse::from_ranked(Vec::new(), diagnostics));
                }
            },
        };
        diagnostics.unresolved_tokens = resolved.failures.iter().map(|f| f.token).collect();

        let (paths, disqualified): (Vec<_>, Vec<_>) = paths
            .into_iter()
            .partition(|p| p.tokens().all(|t| resolved.is_resolved(&t.key())));
        diagnostics.rejected.extend(disqualified.into_iter().map(|path| RejectedPath {
            path,
            reason: RejectReason::DecimalsUnresolved,
            source: None,
            amount_in: None,
            amount_out: None,
        }));

        let (Some(sell_decimals), Some(buy_decimals)) =
            (resolved.get(&req.sell_token.key()), resolved.get(&req.buy_token.key()))
        else {
            return Some(RouteResponse::from_ranked(Vec::new(), diagnostics));
        };

        let fetched = self
            .fetcher
            .fetch_quotes_until(paths, req.amount, req.mode, Arc::new(resolved.decimals), deadline, cancel)
            .await?;
        diagnostics.hop_failures = fetched.hop_failures;
        diagnostics.timed_out = fetched.timed_out;

        let ctx = SanityContext {
            sell_decimals,
            buy_decimals,
            reference_price: req.reference_price,
        };
        diagnostics.sanity_unchecked = unchecked_count(&fetched.quotes, req.mode, &ctx);
        let (kept, rejected) = filter_valid(fetched.quotes, req.mode, &ctx);
        diagnostics.rejected.extend(rejected);

        let ranked = rank_routes(kept, req.mode);
        Some(RouteResponse::from_ranked(ranked, diagnostics))
    }
}

#[derive(Debug, Deserialize)]
pub struct RoutesRequest {
    pub sell_token: Token,
    pub buy_token: Token,
    /// Base units, decimal string.
    pub amount: String,
    pub mode: SwapMode,
    pub max_hops: Option<u8>,
    pub allowed_intermediates: Option<Vec<Token>>,
    pub reference_price: Option<f64>,
}

impl RoutesRequest {
    pub fn into_route_request(self) -> Result<RouteRequest, CallerInputError> {
        let amount = parse_amount(&self.amount)?;
        Ok(RouteRequest {
            sell_token: self.sell_token,
            buy_token: self.buy_token,
            amount,
            mode: self.mode,
            max_hops: self.max_hops,
            allowed_intermediates: self.allowed_intermediates,
            reference_price: self.reference_price,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HopResponse {
    pub venue: String,
    pub pool: String,
    pub token_in: String,
    pub token_out: String,
}

#[derive(Debug, Serialize)]
pub struct RankedRouteResponse {
    pub rank: usize,
    pub source: String,
    pub path: String,
    pub hops: Vec<HopResponse>,
    pub amount_in: String,
    pub amount_out: String,
    pub amount_in_display: String,
    pub amount_out_display: String,
    pub hop_amounts: Vec<String>,
    pub effective_price: f64,
}

impl From<&RankedRoute> for RankedRouteResponse {
    fn from(r: &RankedRoute) -> Self {
        let q = &r.quote;
        let display = |amount: U256, token: &Token| format_units(amount, token.decimals.unwrap_or(0));
        Self {
            rank: r.rank,
            source: q.source.clone(),
            path: q.path.to_string(),
            hops: q
                .path
                .hops()
                .iter()
                .map(|h| HopResponse {
                    venue: h.venue.to_string(),
                    pool: h.pool.to_string(),
                    token_in: h.token_in.label(),
                    token_out: h.token_out.label(),
                })
                .collect(),
            amount_in: q.amount_in.to_string(),
            amount_out: q.amount_out.to_string(),
            amount_in_display: display(q.amount_in, q.path.sell_token()),
            amount_out_display: display(q.amount_out, q.path.buy_token()),
            hop_amounts: q.hop_amounts.iter().map(U256::to_string).collect(),
            effective_price: r.effective_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RejectedResponse {
    pub path: String,
    pub reason: &'static str,
    pub source: Option<String>,
    pub amount_in: Option<String>,
    pub amount_out: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub rejected: Vec<RejectedResponse>,
    pub unresolved_tokens: Vec<String>,
    pub hop_failures: HopFailureCounts,
    pub paths_considered: usize,
    pub sanity_unchecked: usize,
    pub timed_out: bool,
}

#[derive(Debug, Serialize)]
pub struct RoutesResponse {
    pub best: Option<RankedRouteResponse>,
    pub all: Vec<RankedRouteResponse>,
    pub diagnostics: DiagnosticsResponse,
}

impl From<&RouteResponse> for RoutesResponse {
    fn from(resp: &RouteResponse) -> Self {
        let d = &resp.diagnostics;
        Self {
            best: resp.best.as_ref().map(RankedRouteResponse::from),
            all: resp.all.iter().map(RankedRouteResponse::from).collect(),
            diagnostics: DiagnosticsResponse {
                rejected: d
                    .rejected
                    .iter()
                    .map(|r| RejectedResponse {
                        path: r.path.to_string(),
                        reason: r.reason.as_str(),
                        source: r.source.clone(),
                        amount_in: r.amount_in.map(|a| a.to_string()),
                        amount_out: r.amount_out.map(|a| a.to_string()),
                    })
                    .collect(),
                unresolved_tokens: d.unresolved_tokens.iter().map(TokenKey::to_string).collect(),
                hop_failures: d.hop_failures,
                paths_considered: d.paths_considered,
                sanity_unchecked: d.sanity_unchecked,
                timed_out: d.timed_out,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Create the HTTP router with API endpoints
pub fn create_api_router(router: Arc<Router>) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/api/v1/routes", post(get_routes))
        .route("/metrics", get(metrics))
        .with_state(router)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics() -> String {
    crate::metrics::render()
}

async fn get_routes(
    State(router): State<Arc<Router>>,
    Json(req): Json<RoutesRequest>,
) -> Result<Json<RoutesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let bad_request = |e: CallerInputError| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    };
    let req = req.into_route_request().map_err(bad_request)?;
    let resp = router.get_routes(req).await.map_err(bad_request)?;
    Ok(Json(RoutesResponse::from(&resp)))
}
