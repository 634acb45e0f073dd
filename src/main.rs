//! # factcheck_news
//!
//! Scrapes the latest fact-checks from Newtral, normalizes them and upserts
//! them into a JSON store, then reports total/new/updated/failed counts.
//!
//! ## Usage
//!
//! ```sh
//! factcheck_news --limit 20 --store data/factchecks.json
//! RUST_LOG=debug factcheck_news --no-browser
//! ```

use clap::Parser;
use factcheck_news::{FactCheckScraper, FactCheckStore, ScrapeMode, ScraperConfig};
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod logging;

use cli::Cli;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (subscriber, _log_guards) = logging::build_subscriber(&args.log_dir, filter)?;
    subscriber.init();

    let start_time = std::time::Instant::now();
    info!(log_dir = %args.log_dir.display(), "factcheck_news starting up");
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = match &args.config {
        Some(path) => ScraperConfig::load(path)?,
        None => ScraperConfig::default(),
    };
    if args.ignore_robots {
        config.respect_robots = false;
    }
    if args.no_browser {
        config.mode = ScrapeMode::Http;
    }
    info!(
        limit = args.limit,
        respect_robots = config.respect_robots,
        mode = ?config.mode,
        "Configuration ready"
    );

    // Open the store first so a bad path fails before any scraping.
    let mut store = FactCheckStore::open(&args.store).await?;

    // ---- Scrape ----
    let mut scraper = FactCheckScraper::from_config(config)?;
    let records = scraper.scrape(args.limit).await;

    // ---- Persist ----
    let summary = store.upsert_all(records);
    if let Err(e) = store.save().await {
        error!(
            path = %args.store.display(),
            error = %e,
            "Store is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    println!(
        "Scraped {} fact-checks: {} new, {} updated, {} failed",
        summary.total, summary.new, summary.updated, summary.failed
    );

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        %summary,
        "Execution complete"
    );

    Ok(())
}
