use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Currency;

/// Dollar market ("casa") a quote comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RateKind {
    Oficial,
    Blue,
    /// MEP
    Bolsa,
    /// CCL
    ContadoConLiqui,
    Mayorista,
    Cripto,
    Tarjeta,
    Other(String),
}

impl RateKind {
    pub fn as_str(&self) -> &str {
        match self {
            RateKind::Oficial => "oficial",
            RateKind::Blue => "blue",
            RateKind::Bolsa => "bolsa",
            RateKind::ContadoConLiqui => "contadoconliqui",
            RateKind::Mayorista => "mayorista",
            RateKind::Cripto => "cripto",
            RateKind::Tarjeta => "tarjeta",
            RateKind::Other(casa) => casa.as_str(),
        }
    }

    pub fn from_casa(casa: &str) -> Self {
        match casa.trim().to_lowercase().as_str() {
            "oficial" => RateKind::Oficial,
            "blue" => RateKind::Blue,
            "bolsa" | "mep" => RateKind::Bolsa,
            "contadoconliqui" | "ccl" => RateKind::ContadoConLiqui,
            "mayorista" => RateKind::Mayorista,
            "cripto" => RateKind::Cripto,
            "tarjeta" => RateKind::Tarjeta,
            other => RateKind::Other(other.to_string()),
        }
    }
}

impl From<String> for RateKind {
    fn from(casa: String) -> Self {
        RateKind::from_casa(&casa)
    }
}

impl From<RateKind> for String {
    fn from(kind: RateKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base: Currency,
    pub quote: Currency,
    pub kind: RateKind,
    pub name: String,
    pub buy: Option<f64>,
    pub sell: Option<f64>,
    pub source: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ExchangeRate {
    /// `"USD/ARS"` style key
    pub fn pair(&self) -> String {
        pair_key(self.base, self.quote)
    }

    /// Selling price of one unit of `base`, when it is usable as a divisor
    pub fn usable_sell(&self) -> Option<f64> {
        self.sell.filter(|v| v.is_finite() && *v > 0.0)
    }
}

pub fn pair_key(base: Currency, quote: Currency) -> String {
    format!("{}/{}", base, quote)
}

pub fn find_rate<'a>(rates: &'a [ExchangeRate], kind: &RateKind) -> Option<&'a ExchangeRate> {
    rates.iter().find(|rate| &rate.kind == kind)
}
