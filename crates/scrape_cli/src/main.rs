mod targets;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use scrape_engine::{EngineConfig, Orchestrator, ReqwestProviderClient};
use scrape_logging::{scrape_info, scrape_warn, LevelFilter, LogDestination};

/// Bearer token for the scraping backend.
const TOKEN_ENV: &str = "SCRAPE_API_TOKEN";

#[derive(Parser)]
#[command(
    name = "scrape-cascade",
    about = "Resolve URLs through scraping backends with direct-fetch and placeholder fallbacks",
    version
)]
struct Cli {
    /// Target URLs.
    urls: Vec<String>,

    /// File with one target per line: `url | city | state`.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// RON engine config. Built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// Print results as single-line JSON.
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match cli.log_file.clone() {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    scrape_logging::initialize(destination, level);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let mut targets = targets::from_args(&cli.urls);
    if let Some(path) = &cli.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read target list {}", path.display()))?;
        targets.extend(targets::parse_target_list(&text));
    }
    if targets.is_empty() {
        bail!("no targets given; pass URLs or --file");
    }

    let token = std::env::var(TOKEN_ENV).ok();
    if token.is_none() {
        scrape_warn!("{} is not set; backend requests are unauthenticated", TOKEN_ENV);
    }
    let client = ReqwestProviderClient::new(
        &config.backend.fetch_settings(),
        config.retry.policy(),
        token,
    )
    .context("failed to build backend client")?;

    scrape_info!("Scraping {} target(s)", targets.len());
    let orchestrator = Orchestrator::from_config(&config, Arc::new(client));
    let results = orchestrator.scrape(targets).await;

    let json = if cli.compact {
        serde_json::to_string(&results)?
    } else {
        serde_json::to_string_pretty(&results)?
    };
    println!("{json}");
    Ok(())
}
