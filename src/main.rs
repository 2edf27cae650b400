use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use route_aggr::config::AppConfig;
use route_aggr::decimals::DecimalCache;
use route_aggr::router::{create_api_router, Router};
use route_aggr::transport::JsonRpc;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal aggregator error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration")?;
    let rpc = Arc::new(
        JsonRpc::new(config.rpc_url.to_string())
            .with_context(|| format!("create JSON-RPC client for {}", config.rpc_url))?,
    );

    let chain_id = rpc
        .readiness_probe(Duration::from_secs(30))
        .await
        .context("JSON-RPC readiness probe failed")?;
    if chain_id != config.chain_id {
        bail!(
            "endpoint {} serves chain {chain_id}, configured for {}",
            rpc.endpoint(),
            config.chain_id
        );
    }

    let router = Arc::new(config.build_router(rpc.clone()));
    let app = App {
        config: Arc::new(config),
        rpc,
        router,
    };
    app.run().await
}

struct App {
    config: Arc<AppConfig>,
    rpc: Arc<JsonRpc>,
    router: Arc<Router>,
}

impl App {
    async fn run(self) -> Result<()> {
        info!(
            chain_id = self.config.chain_id,
            rpc = %self.rpc.endpoint(),
            venues = self.router.venues().len(),
            intermediates = self.config.intermediates.len(),
            "route aggregator online"
        );
        for venue in self.router.venues() {
            info!(venue = %venue.id, kind = venue.kind.as_str(), "venue registered");
        }

        let api_router = create_api_router(self.router.clone()).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );
        let api_addr = self.config.api_addr;
        let listener = tokio::net::TcpListener::bind(api_addr)
            .await
            .with_context(|| format!("bind API server address {api_addr}"))?;
        info!(address = %api_addr, "HTTP API server starting");
        let _api_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, api_router).await {
                warn!(error = %e, "API server error");
            }
        });

        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    info!(
                        max_inflight = self.config.max_inflight,
                        cached_decimals = DecimalCache::shared().len(),
                        "route aggregator heartbeat"
                    );
                }
                res = tokio::signal::ctrl_c() => {
                    if let Err(err) = res {
                        warn!(error = %err, "ctrl_c listener error");
                    }
                    info!("Shutdown signal received, exiting");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
