//! Lookup proxy - keeps the ABR GUID server-side and caches lookups
//!
//! Usage: ABR_GUID=your-guid office-locator-proxy

use anyhow::Context;
use clap::Parser;
use office_locator::infra::cache::DEFAULT_TTL;
use office_locator::infra::logging::init_logging;
use office_locator::infra::Metrics;
use office_locator::io::proxy_server::{start_proxy_server, ProxyOptions, ProxyState, DEFAULT_PORT};
use office_locator::io::HttpClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Same-origin proxy for ABN Lookup and Nominatim
#[derive(Parser, Debug)]
#[command(name = "office-locator-proxy", version = VERSION, about)]
struct Args {
    /// Listen port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// ABN Lookup GUID; searches answer 500 without it
    #[arg(long, env = "ABR_GUID", hide_env_values = true)]
    abr_guid: Option<String>,

    #[arg(long, env = "ABR_JSON_BASE", default_value = "https://abr.business.gov.au/json")]
    abr_base: String,

    #[arg(long, env = "NOMINATIM_BASE", default_value = "https://nominatim.openstreetmap.org")]
    nominatim_base: String,

    /// Keyword used for the territory signal in search replies
    #[arg(long, env = "TERRITORY_KEYWORD", default_value = "")]
    territory_keyword: String,

    /// Request timeout in milliseconds
    #[arg(long, env = "HTTP_TIMEOUT_MS", default_value_t = 10_000)]
    http_timeout_ms: u64,

    /// Seconds between metrics summaries in the log (0 disables)
    #[arg(long, default_value_t = 60)]
    metrics_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    info!(version = VERSION, "office_locator_proxy_starting");

    let client = HttpClient::new(Duration::from_millis(args.http_timeout_ms))
        .context("Failed to build HTTP client")?;
    let options = ProxyOptions {
        abr_base: args.abr_base.trim_end_matches('/').to_string(),
        abr_guid: args.abr_guid,
        nominatim_base: args.nominatim_base.trim_end_matches('/').to_string(),
        territory_keyword: args.territory_keyword,
        cache_ttl: DEFAULT_TTL,
        ..ProxyOptions::default()
    };
    info!(
        port = args.port,
        abr_base = %options.abr_base,
        nominatim_base = %options.nominatim_base,
        territory_keyword = %options.territory_keyword,
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let state = Arc::new(ProxyState::new(Arc::new(client), options, metrics.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if args.metrics_interval_secs > 0 {
        let mut metrics_shutdown = shutdown_rx.clone();
        let period = Duration::from_secs(args.metrics_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => metrics.report().log(),
                    _ = metrics_shutdown.changed() => break,
                }
            }
        });
    }

    let mut server = tokio::spawn(start_proxy_server(args.port, state.clone(), shutdown_rx));

    let outcome = tokio::select! {
        outcome = &mut server => outcome,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("shutdown_requested");
            let _ = shutdown_tx.send(true);
            server.await
        }
    };

    state.metrics().report().log();
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(error = %e, "proxy_server_error");
            Err(anyhow::anyhow!(e))
        }
        Err(e) => Err(e).context("Proxy server task failed"),
    }
}
