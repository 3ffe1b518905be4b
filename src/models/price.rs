use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Country, Currency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceOrigin {
    Scraped,
    Fallback,
}

impl fmt::Display for PriceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceOrigin::Scraped => write!(f, "scraped"),
            PriceOrigin::Fallback => write!(f, "fallback"),
        }
    }
}

/// One price read from one storefront, or the default that replaced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub product_id: String,
    pub country: Country,
    pub currency: Currency,
    pub value: f64,
    pub url: String,
    pub origin: PriceOrigin,
    pub description: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,
}

impl PriceObservation {
    pub fn scraped(
        product_id: &str,
        country: Country,
        value: f64,
        url: &str,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id: product_id.to_string(),
            country,
            currency: country.currency(),
            value,
            url: url.to_string(),
            origin: PriceOrigin::Scraped,
            description: format!("Scraped from {}", url),
            observed_at,
            capture: None,
        }
    }

    pub fn fallback(
        product_id: &str,
        country: Country,
        value: f64,
        url: &str,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            origin: PriceOrigin::Fallback,
            description: format!("Fallback price for {}", url),
            ..Self::scraped(product_id, country, value, url, observed_at)
        }
    }

    pub fn with_capture(mut self, capture: Option<String>) -> Self {
        self.capture = capture;
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == PriceOrigin::Fallback
    }
}
