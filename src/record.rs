use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ProductConfig;
use crate::models::{Currency, ExchangeRate, PriceObservation, Vendor};

/// USD value of a price that is already quoted in dollars
pub const DIRECT_USD: &str = "direct";

/// Rate kind → USD value
pub type UsdValues = BTreeMap<String, f64>;

/// The document persisted once per product per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub product_id: String,
    pub product_name: String,
    pub vendor: Vendor,
    pub scraped_at: DateTime<Utc>,
    /// Country code → observation
    pub prices: BTreeMap<String, PriceObservation>,
    /// `"USD/ARS"` → every quote for that pair
    pub exchange_rates: BTreeMap<String, Vec<ExchangeRate>>,
    /// Country code → USD equivalents
    pub usd_values: BTreeMap<String, UsdValues>,
    /// Rate kind → US price as a percentage of the converted local price
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub comparison: BTreeMap<String, f64>,
}

impl PriceRecord {
    pub fn scrape_date(&self) -> NaiveDate {
        self.scraped_at.date_naive()
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Plain maps of plain values; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn fallback_count(&self) -> usize {
        self.prices.values().filter(|p| p.is_fallback()).count()
    }
}

/// Assemble the record for `product` from whatever was scraped. Listings with
/// no observation get their fallback price.
pub fn build_record(
    product: &ProductConfig,
    observations: &[PriceObservation],
    rates: &[ExchangeRate],
    scraped_at: DateTime<Utc>,
) -> PriceRecord {
    let mut prices = BTreeMap::new();
    for listing in &product.listings {
        let observation = observations
            .iter()
            .find(|o| o.country == listing.country && o.product_id == product.id)
            .cloned()
            .unwrap_or_else(|| {
                PriceObservation::fallback(
                    &product.id,
                    listing.country,
                    listing.fallback_price,
                    &listing.url,
                    scraped_at,
                )
            });
        prices.insert(listing.country.code().to_string(), observation);
    }

    let exchange_rates = attach_rates(&prices, rates);

    let mut usd_values = BTreeMap::new();
    for (country, observation) in &prices {
        let values = usd_values_for(observation, rates);
        if !values.is_empty() {
            usd_values.insert(country.clone(), values);
        }
    }

    let comparison = compare(&prices, &usd_values);

    PriceRecord {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        vendor: product.vendor,
        scraped_at,
        prices,
        exchange_rates,
        usd_values,
        comparison,
    }
}

/// Rates whose quote currency is one of the record's price currencies.
fn attach_rates(
    prices: &BTreeMap<String, PriceObservation>,
    rates: &[ExchangeRate],
) -> BTreeMap<String, Vec<ExchangeRate>> {
    let mut attached: BTreeMap<String, Vec<ExchangeRate>> = BTreeMap::new();
    for rate in rates {
        let used = prices
            .values()
            .any(|p| p.currency == rate.quote && p.currency != rate.base);
        if used {
            attached.entry(rate.pair()).or_default().push(rate.clone());
        }
    }
    attached
}

fn usd_values_for(observation: &PriceObservation, rates: &[ExchangeRate]) -> UsdValues {
    let mut values = UsdValues::new();
    if observation.currency == Currency::USD {
        values.insert(DIRECT_USD.to_string(), observation.value);
        return values;
    }

    for rate in rates
        .iter()
        .filter(|r| r.base == Currency::USD && r.quote == observation.currency)
    {
        if let Some(sell) = rate.usable_sell() {
            values.insert(rate.kind.to_string(), observation.value / sell);
        }
    }
    values
}

fn compare(
    prices: &BTreeMap<String, PriceObservation>,
    usd_values: &BTreeMap<String, UsdValues>,
) -> BTreeMap<String, f64> {
    let mut comparison = BTreeMap::new();

    let us_price = match prices.values().find(|p| p.currency == Currency::USD) {
        Some(price) => price.value,
        None => return comparison,
    };

    for (country, values) in usd_values {
        let local_is_usd = prices.get(country).map(|p| p.currency == Currency::USD).unwrap_or(true);
        if local_is_usd {
            continue;
        }
        for (kind, local_usd) in values {
            if *local_usd > 0.0 {
                comparison.insert(kind.clone(), us_price * 100.0 / local_usd);
            }
        }
    }
    comparison
}
