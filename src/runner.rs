use anyhow::Result;
use chrono::Utc;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::config::{Config, Settings};
use crate::models::{find_rate, ExchangeRate, RateKind, RATE_SOURCE_DOLARAPI};
use crate::record::{build_record, PriceRecord};
use crate::scrapers::{default_scrapers, scraper_for, CaptureWriter, ProductScraper, ScrapeContext};
use crate::storage::{LocalJsonSink, SaveOutcome, Sink, SqliteSink, SupabaseSink};
use crate::utils::exchange_rate::DolarApiClient;
use crate::utils::http::create_client;
use crate::webhook::Revalidator;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub records: usize,
    pub fallback_prices: usize,
    pub rate_count: usize,
    /// Where the rates came from: `dolarapi`, a sink name, or nothing.
    pub rate_source: Option<String>,
    /// Products written by at least one sink
    pub saved: Vec<String>,
    pub sink_failures: usize,
    pub revalidated: bool,
}

pub struct Runner {
    config: Config,
    ctx: ScrapeContext,
    rates: DolarApiClient,
    scrapers: Vec<Box<dyn ProductScraper>>,
    sinks: Vec<Box<dyn Sink>>,
    revalidator: Option<Revalidator>,
}

impl Runner {
    pub fn new(config: Config, client: Client, sinks: Vec<Box<dyn Sink>>) -> Self {
        let settings = &config.settings;
        let rates = DolarApiClient::new(settings.exchange_rate_api_url.clone(), settings.max_retries);
        let ctx = ScrapeContext {
            client,
            captures: None,
            max_attempts: settings.max_retries,
        };

        Self {
            config,
            ctx,
            rates,
            scrapers: default_scrapers(),
            sinks,
            revalidator: None,
        }
    }

    /// Everything the binary needs, wired from the loaded settings.
    pub fn from_config(config: Config) -> Result<Self> {
        let settings = &config.settings;
        let client = create_client(settings)?;

        let captures = if settings.debug {
            match CaptureWriter::new(&settings.screenshots_dir) {
                Ok(writer) => {
                    info!("Saving page captures to {}", writer.dir().display());
                    Some(writer)
                }
                Err(e) => {
                    warn!("Page captures disabled: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let sinks = sinks_from_settings(settings, &client);
        let revalidator = Revalidator::from_settings(settings);

        Ok(Self::new(config, client, sinks)
            .with_captures(captures)
            .with_revalidator(revalidator))
    }

    pub fn with_captures(mut self, captures: Option<CaptureWriter>) -> Self {
        self.ctx.captures = captures;
        self
    }

    pub fn with_revalidator(mut self, revalidator: Option<Revalidator>) -> Self {
        self.revalidator = revalidator;
        self
    }

    pub fn with_scrapers(mut self, scrapers: Vec<Box<dyn ProductScraper>>) -> Self {
        self.scrapers = scrapers;
        self
    }

    pub async fn run_once(&self) -> RunSummary {
        let started_at = Utc::now();
        let mut summary = RunSummary::default();

        let (rates, rate_source) = self.load_rates().await;
        summary.rate_count = rates.len();
        summary.rate_source = rate_source;

        for product in &self.config.products {
            let observations = match scraper_for(&self.scrapers, product.vendor) {
                Ok(scraper) => scraper.scrape(&self.ctx, product).await,
                Err(e) => {
                    error!("{}; using fallback prices for {}", e, product.name);
                    Vec::new()
                }
            };

            let record = build_record(product, &observations, &rates, Utc::now());
            log_record(&record);

            summary.records += 1;
            summary.fallback_prices += record.fallback_count();

            let mut saved = false;
            for sink in &self.sinks {
                match sink.save(&record).await {
                    Ok(SaveOutcome::Saved) => saved = true,
                    Ok(SaveOutcome::Skipped) => {}
                    Err(e) => {
                        error!("Failed to save {} to {}: {:#}", record.product_id, sink.name(), e);
                        summary.sink_failures += 1;
                    }
                }
            }
            if saved {
                summary.saved.push(record.product_id.clone());
            }
        }

        if let Some(revalidator) = &self.revalidator {
            if summary.saved.is_empty() {
                info!("Nothing was saved; skipping revalidation");
            } else {
                match revalidator.trigger(&self.ctx.client, &summary.saved, started_at).await {
                    Ok(()) => summary.revalidated = true,
                    Err(e) => error!("Revalidation failed: {:#}", e),
                }
            }
        }

        info!(
            "Run complete: {} records, {} fallback prices, {} saved, {} sink failures",
            summary.records,
            summary.fallback_prices,
            summary.saved.len(),
            summary.sink_failures
        );
        summary
    }

    /// Live rates, else the most recent ones any sink still holds.
    async fn load_rates(&self) -> (Vec<ExchangeRate>, Option<String>) {
        match self.rates.fetch_all(&self.ctx.client).await {
            Ok(rates) if !rates.is_empty() => {
                for kind in [RateKind::Oficial, RateKind::Blue] {
                    if let Some(rate) = find_rate(&rates, &kind) {
                        info!("Dollar {}: buy {:?} / sell {:?}", rate.name, rate.buy, rate.sell);
                    }
                }
                return (rates, Some(RATE_SOURCE_DOLARAPI.to_string()));
            }
            Ok(_) => warn!("Rate API returned no quotes"),
            Err(e) => error!("Failed to fetch exchange rates: {:#}", e),
        }

        for sink in &self.sinks {
            match sink.latest_rates().await {
                Ok(Some(rates)) => {
                    info!("Recovered {} exchange rates from {}", rates.len(), sink.name());
                    return (rates, Some(sink.name().to_string()));
                }
                Ok(None) => {}
                Err(e) => warn!("Could not read stored rates from {}: {:#}", sink.name(), e),
            }
        }

        warn!("No exchange rates available; USD conversions will be omitted");
        (Vec::new(), None)
    }
}

pub fn sinks_from_settings(settings: &Settings, client: &Client) -> Vec<Box<dyn Sink>> {
    let sqlite = if settings.save_to_sqlite {
        match SqliteSink::open(&settings.sqlite_path) {
            Ok(sink) => sink,
            Err(e) => {
                error!("SQLite sink disabled: {:#}", e);
                SqliteSink::disabled()
            }
        }
    } else {
        SqliteSink::disabled()
    };

    vec![
        Box::new(LocalJsonSink::new(&settings.data_dir, settings.save_local)),
        Box::new(SupabaseSink::from_settings(settings, client.clone())),
        Box::new(sqlite),
    ]
}

fn log_record(record: &PriceRecord) {
    for (country, price) in &record.prices {
        info!(
            "{} {}: {} {} ({})",
            record.product_name,
            country,
            price.value,
            price.currency,
            price.description
        );
    }

    for (country, values) in &record.usd_values {
        for (kind, value) in values {
            info!("{} {} in USD ({}): {:.2}", record.product_name, country, kind, value);
        }
    }

    for (kind, percentage) in &record.comparison {
        info!(
            "{}: US price is {:.2}% of the local price at the {} rate",
            record.product_name, percentage, kind
        );
    }
}
