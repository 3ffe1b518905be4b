use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::ExchangeRate;
use crate::record::PriceRecord;

mod local;
mod sqlite;
mod supabase;

pub use local::LocalJsonSink;
pub use sqlite::SqliteSink;
pub use supabase::SupabaseSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The sink's flag is off; nothing was written.
    Skipped,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{table} rejected the row: {status} {body}")]
    Rejected {
        table: String,
        status: u16,
        body: String,
    },

    #[error("row-level security policy blocked the insert into {table}: {message}")]
    RowLevelSecurity { table: String, message: String },
}

/// Destination for price records.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool;

    /// Persist `record`; a disabled sink returns `Skipped` without any I/O.
    async fn save(&self, record: &PriceRecord) -> Result<SaveOutcome>;

    /// Rates from the most recent stored record, used when the rate API is down.
    async fn latest_rates(&self) -> Result<Option<Vec<ExchangeRate>>> {
        Ok(None)
    }
}

/// Pull the rate lists back out of a stored record document, tagging them
/// with the sink they were recovered from.
pub fn rates_from_record_json(data: &Value, source: &str) -> Option<Vec<ExchangeRate>> {
    let pairs = data.get("exchange_rates")?.as_object()?;
    let mut rates = Vec::new();
    for (pair, list) in pairs {
        match serde_json::from_value::<Vec<ExchangeRate>>(list.clone()) {
            Ok(found) => rates.extend(found),
            Err(e) => warn!("Ignoring stored rates for {}: {}", pair, e),
        }
    }

    for rate in rates.iter_mut() {
        rate.source = source.to_string();
    }

    if rates.is_empty() {
        None
    } else {
        Some(rates)
    }
}
