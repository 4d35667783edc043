//! Office locator - one-shot company head-office lookup
//!
//! Searches the configured registry, geocodes the head office and prints the
//! rendered result (or the record JSON with `--json`).
//!
//! Module structure:
//! - `domain/` - Company record and inference helpers
//! - `io/` - Registry and geocoding clients, proxy server
//! - `services/` - Lookup pipeline, rendering, front-end state
//! - `infra/` - Config, cache, logging, metrics

use anyhow::{bail, Context};
use clap::Parser;
use office_locator::infra::logging::init_logging;
use office_locator::infra::Config;
use office_locator::services::{LookupService, ResultView};
use tracing::info;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Look up a company's head office, franchise and territory signals
#[derive(Parser, Debug)]
#[command(name = "office-locator", version = VERSION, about)]
struct Args {
    /// Company name (words are joined with spaces)
    #[arg(required = true)]
    query: Vec<String>,

    /// Path to a KEY=VALUE config file (default: .env.local, env.local)
    #[arg(short, long)]
    config: Option<String>,

    /// Registry provider override: opencorporates, abr, proxy or mock
    #[arg(short, long)]
    provider: Option<String>,

    /// Territory keyword override
    #[arg(short, long)]
    territory: Option<String>,

    /// Print the record as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    info!(version = VERSION, "office_locator_starting");

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(&[]),
    };
    if let Some(provider) = &args.provider {
        if !config.apply_setting("REGISTRY_PROVIDER", provider) {
            bail!("unknown registry provider '{provider}'");
        }
    }
    if let Some(territory) = &args.territory {
        config.apply_setting("TERRITORY_KEYWORD", territory);
    }

    info!(
        config_file = %config.config_file(),
        provider = %config.provider().as_str(),
        fallback = %config.fallback().as_str(),
        territory_keyword = %config.territory_keyword(),
        cache_file = ?config.cache_file(),
        "config_loaded"
    );

    let service = LookupService::from_config(&config).context("Failed to build HTTP client")?;
    let outcome = service.search(&args.query.join(" ")).await;
    service.metrics().report().log();

    let record = outcome?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", ResultView::from_record(&record).to_text());
    }
    Ok(())
}
