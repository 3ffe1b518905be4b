use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::models::ExchangeRate;
use crate::record::PriceRecord;
use crate::storage::{rates_from_record_json, SaveOutcome, Sink};

/// Embedded copy of the hosted `precios` table, one row per product per day.
pub struct SqliteSink {
    conn: Option<Mutex<Connection>>,
}

impl SqliteSink {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open SQLite database {}", db_path.as_ref().display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open SQLite database")?;
        Self::with_connection(conn)
    }

    pub fn disabled() -> Self {
        Self { conn: None }
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let sink = Self {
            conn: Some(Mutex::new(conn)),
        };
        sink.migrate()?;
        Ok(sink)
    }

    fn lock(&self) -> Result<Option<MutexGuard<'_, Connection>>> {
        match &self.conn {
            Some(conn) => conn
                .lock()
                .map(Some)
                .map_err(|_| anyhow!("SQLite connection lock poisoned")),
            None => Ok(None),
        }
    }

    fn migrate(&self) -> Result<()> {
        let Some(conn) = self.lock()? else {
            return Ok(());
        };

        conn.execute(
            "CREATE TABLE IF NOT EXISTS precios (
                product_id TEXT NOT NULL,
                scrape_date TEXT NOT NULL,
                scraped_at TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (product_id, scrape_date)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_precios_scraped_at ON precios(scraped_at)",
            [],
        )?;

        info!("Database migration completed");
        Ok(())
    }
}

#[async_trait]
impl Sink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn enabled(&self) -> bool {
        self.conn.is_some()
    }

    async fn save(&self, record: &PriceRecord) -> Result<SaveOutcome> {
        let Some(conn) = self.lock()? else {
            return Ok(SaveOutcome::Skipped);
        };

        let data = serde_json::to_string(record)?;
        conn.execute(
            "INSERT OR REPLACE INTO precios (product_id, scrape_date, scraped_at, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &record.product_id,
                record.scrape_date().to_string(),
                record.scraped_at.to_rfc3339(),
                data
            ],
        )?;

        info!("Stored {} in SQLite", record.product_id);
        Ok(SaveOutcome::Saved)
    }

    async fn latest_rates(&self) -> Result<Option<Vec<ExchangeRate>>> {
        let Some(conn) = self.lock()? else {
            return Ok(None);
        };

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM precios ORDER BY scraped_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let Some(data) = data else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(&data)?;
        Ok(rates_from_record_json(&value, self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ListingConfig, ProductConfig};
    use crate::models::{Country, Currency, RateKind, Vendor};
    use crate::record::build_record;
    use chrono::{TimeZone, Utc};

    fn row_count(sink: &SqliteSink) -> usize {
        match sink.lock().unwrap() {
            Some(conn) => conn
                .query_row("SELECT COUNT(*) FROM precios", [], |row| row.get::<_, i64>(0))
                .unwrap() as usize,
            None => 0,
        }
    }

    fn record(hour: u32, sell: f64) -> PriceRecord {
        let product = ProductConfig {
            id: "air_force_1".to_string(),
            name: "Nike Air Force 1".to_string(),
            vendor: Vendor::Nike,
            listings: vec![ListingConfig {
                country: Country::AR,
                url: "https://www.nike.com.ar/af1".to_string(),
                fallback_price: 199_999.0,
            }],
        };
        let rates = vec![ExchangeRate {
            base: Currency::USD,
            quote: Currency::ARS,
            kind: RateKind::Oficial,
            name: "Oficial".to_string(),
            buy: None,
            sell: Some(sell),
            source: "dolarapi".to_string(),
            updated_at: None,
        }];
        build_record(&product, &[], &rates, Utc.with_ymd_and_hms(2026, 10, 16, hour, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_same_day_save_replaces_row() {
        let sink = SqliteSink::open_in_memory().unwrap();
        assert_eq!(sink.save(&record(8, 1000.0)).await.unwrap(), SaveOutcome::Saved);
        assert_eq!(sink.save(&record(20, 1050.0)).await.unwrap(), SaveOutcome::Saved);
        assert_eq!(row_count(&sink), 1);

        let rates = sink.latest_rates().await.unwrap().unwrap();
        assert_eq!(rates[0].sell, Some(1050.0));
        assert_eq!(rates[0].source, "sqlite");
    }

    #[tokio::test]
    async fn test_empty_database_has_no_rates() {
        let sink = SqliteSink::open_in_memory().unwrap();
        assert!(sink.latest_rates().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_sink_skips() {
        let sink = SqliteSink::disabled();
        assert!(!sink.enabled());
        assert_eq!(sink.save(&record(8, 1000.0)).await.unwrap(), SaveOutcome::Skipped);
        assert_eq!(row_count(&sink), 0);
    }
}
