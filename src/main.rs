use anyhow::Result;
use chrono::Local;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod models;
mod parsers;
mod record;
mod runner;
mod scrapers;
mod storage;
mod utils;
mod webhook;

use crate::config::Config;
use crate::runner::{RunSummary, Runner};

const DEFAULT_LOG_DIRECTIVE: &str = "price_scraper=info";

/// `RUST_LOG` when set, otherwise info for this crate only.
fn log_filter(rust_log: Option<String>) -> EnvFilter {
    match rust_log.filter(|directives| !directives.trim().is_empty()) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(DEFAULT_LOG_DIRECTIVE),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    // Initialize logging
    let filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok());
    if config.settings.wants_json_logs() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting price scraper");
    if config.settings.debug {
        info!("Debug mode enabled");
    }

    let run_interval = config.settings.run_interval_seconds;
    let runner = Runner::from_config(config)?;

    let Some(seconds) = run_interval else {
        report(&runner.run_once().await);
        return Ok(());
    };

    let mut interval = interval(Duration::from_secs(seconds.max(1)));
    loop {
        interval.tick().await;
        info!("--- Starting scrape at {} ---", Local::now().format("%Y-%m-%d %H:%M:%S"));
        report(&runner.run_once().await);
        info!("Scrape completed, waiting {} seconds", seconds);
    }
}

fn report(summary: &RunSummary) {
    match &summary.rate_source {
        Some(source) => info!("Used {} exchange rates from {}", summary.rate_count, source),
        None => warn!("Ran without exchange rates"),
    }
    if summary.fallback_prices > 0 {
        warn!("{} of the prices are fallback values", summary.fallback_prices);
    }
    if summary.sink_failures > 0 {
        warn!("{} saves failed", summary.sink_failures);
    }
    info!(
        "Saved {}/{} records; revalidated: {}",
        summary.saved.len(),
        summary.records,
        summary.revalidated
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_overrides_default_level() {
        let filter = log_filter(Some("price_scraper=debug".to_string()));
        assert_eq!(filter.to_string(), "price_scraper=debug");
    }

    #[test]
    fn test_default_level_without_rust_log() {
        assert_eq!(log_filter(None).to_string(), DEFAULT_LOG_DIRECTIVE);
        assert_eq!(log_filter(Some("  ".to_string())).to_string(), DEFAULT_LOG_DIRECTIVE);
    }
}
