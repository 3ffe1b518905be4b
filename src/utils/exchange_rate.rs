use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::{Currency, ExchangeRate, RateKind, RATE_SOURCE_DOLARAPI};
use crate::utils::http::fetch_with_retry;

/// One element of the dolarapi.com `/v1/dolares` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DolarApiQuote {
    moneda: String,
    casa: String,
    nombre: String,
    compra: Option<f64>,
    venta: Option<f64>,
    fecha_actualizacion: Option<String>,
}

pub struct DolarApiClient {
    url: String,
    max_attempts: u32,
}

impl DolarApiClient {
    pub fn new(url: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            url: url.into(),
            max_attempts,
        }
    }

    /// All dollar quotes currently published, as USD/ARS rates.
    pub async fn fetch_all(&self, client: &Client) -> Result<Vec<ExchangeRate>> {
        info!("Fetching dollar rates from {}", self.url);

        let response = fetch_with_retry(client, &self.url, &HeaderMap::new(), self.max_attempts).await?;
        let quotes: Vec<DolarApiQuote> = response
            .json()
            .await
            .context("Failed to decode dollar rates")?;

        let rates: Vec<ExchangeRate> = quotes.into_iter().filter_map(into_rate).collect();
        info!("Fetched {} dollar rates", rates.len());
        Ok(rates)
    }
}

fn into_rate(quote: DolarApiQuote) -> Option<ExchangeRate> {
    let base = match Currency::from_code(&quote.moneda) {
        Some(currency) => currency,
        None => {
            warn!("Skipping rate {} quoted in unknown currency {}", quote.casa, quote.moneda);
            return None;
        }
    };

    let updated_at = quote
        .fecha_actualizacion
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(ExchangeRate {
        base,
        quote: Currency::ARS,
        kind: RateKind::from_casa(&quote.casa),
        name: quote.nombre,
        buy: quote.compra,
        sell: quote.venta,
        source: RATE_SOURCE_DOLARAPI.to_string(),
        updated_at,
    })
}
