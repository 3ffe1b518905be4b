use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::{Settings, SupabaseCredentials, SupabaseKeyKind};
use crate::models::ExchangeRate;
use crate::record::PriceRecord;
use crate::storage::{rates_from_record_json, SaveOutcome, Sink, SinkError};

pub const PRICES_TABLE: &str = "precios";
const ON_CONFLICT: &str = "product_id,scrape_date";
const RLS_CODE: &str = "42501";

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

impl PostgrestError {
    fn is_rls_violation(&self) -> bool {
        self.code.as_deref() == Some(RLS_CODE)
            || self
                .message
                .as_deref()
                .map(|m| m.contains("row-level security policy"))
                .unwrap_or(false)
    }
}

/// Upserts one row per product per scrape date into the hosted `precios` table.
pub struct SupabaseSink {
    client: Client,
    credentials: Option<SupabaseCredentials>,
    enabled: bool,
}

impl SupabaseSink {
    /// Missing credentials with the flag on disable the sink instead of
    /// failing the run.
    pub fn from_settings(settings: &Settings, client: Client) -> Self {
        if !settings.save_to_supabase {
            return Self::new(client, None);
        }

        let credentials = settings.supabase_credentials();
        match &credentials {
            Some(creds) if creds.kind == SupabaseKeyKind::ServiceRole => {
                info!("Using SUPABASE_SERVICE_ROLE key for authentication");
            }
            Some(_) => {
                warn!("Using regular SUPABASE_KEY - this may not bypass RLS policies");
            }
            None => {
                error!("SUPABASE_URL and either SUPABASE_SERVICE_ROLE or SUPABASE_KEY must be set; Supabase sink disabled");
            }
        }

        Self::new(client, credentials)
    }

    pub fn new(client: Client, credentials: Option<SupabaseCredentials>) -> Self {
        let enabled = credentials.is_some();
        Self {
            client,
            credentials,
            enabled,
        }
    }

    fn table_url(&self, creds: &SupabaseCredentials) -> String {
        format!("{}/rest/v1/{}", creds.url, PRICES_TABLE)
    }

    fn row(record: &PriceRecord) -> Value {
        json!({
            "product_id": record.product_id,
            "scrape_date": record.scrape_date().to_string(),
            "scraped_at": record.scraped_at,
            "data": record.to_json(),
        })
    }

    fn report_failure(&self, status: u16, body: &str) -> SinkError {
        let details: PostgrestError = serde_json::from_str(body).unwrap_or_default();
        error!(
            "Failed to save price data to {}: {} (code {:?}, details {:?}, hint {:?})",
            PRICES_TABLE,
            details.message.as_deref().unwrap_or(body),
            details.code,
            details.details,
            details.hint
        );

        if details.is_rls_violation() {
            error!("RLS policy violation detected. Make sure you're using the SUPABASE_SERVICE_ROLE key.");
            error!("=== TROUBLESHOOTING RLS ERRORS ===");
            error!("1. Ensure SUPABASE_SERVICE_ROLE is correctly set in environment variables");
            error!("2. If running from a scheduled workflow, check that the secret is configured");
            error!("3. Verify that the service role key has the correct permissions");
            error!("4. Check the RLS policies on the {} table", PRICES_TABLE);
            return SinkError::RowLevelSecurity {
                table: PRICES_TABLE.to_string(),
                message: details.message.unwrap_or_default(),
            };
        }

        SinkError::Rejected {
            table: PRICES_TABLE.to_string(),
            status,
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl Sink for SupabaseSink {
    fn name(&self) -> &'static str {
        "supabase"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn save(&self, record: &PriceRecord) -> Result<SaveOutcome> {
        let creds = match (&self.credentials, self.enabled) {
            (Some(creds), true) => creds,
            _ => return Ok(SaveOutcome::Skipped),
        };

        info!("Attempting to save data for {} to Supabase", record.product_id);

        let response = self
            .client
            .post(self.table_url(creds))
            .query(&[("on_conflict", ON_CONFLICT)])
            .header("apikey", &creds.key)
            .bearer_auth(&creds.key)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&Self::row(record))
            .send()
            .await
            .context("Failed to reach Supabase")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(self.report_failure(status.as_u16(), &body).into());
        }

        let returned: Vec<Value> = serde_json::from_str(&body).unwrap_or_default();
        if returned.is_empty() {
            warn!("Supabase accepted {} but returned no rows", record.product_id);
        } else {
            info!("Successfully saved price data for {}", record.product_id);
        }
        Ok(SaveOutcome::Saved)
    }

    async fn latest_rates(&self) -> Result<Option<Vec<ExchangeRate>>> {
        let creds = match (&self.credentials, self.enabled) {
            (Some(creds), true) => creds,
            _ => return Ok(None),
        };

        let rows: Vec<Value> = self
            .client
            .get(self.table_url(creds))
            .query(&[("select", "data"), ("order", "scraped_at.desc"), ("limit", "1")])
            .header("apikey", &creds.key)
            .bearer_auth(&creds.key)
            .send()
            .await
            .context("Failed to reach Supabase")?
            .error_for_status()
            .context("Supabase refused the rate lookup")?
            .json()
            .await
            .context("Unexpected Supabase response")?;

        Ok(rows
            .first()
            .and_then(|row| row.get("data"))
            .and_then(|data| rates_from_record_json(data, self.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ListingConfig, ProductConfig};
    use crate::models::{Country, Currency, RateKind, Vendor};
    use crate::record::build_record;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> PriceRecord {
        let product = ProductConfig {
            id: "air_force_1".to_string(),
            name: "Nike Air Force 1".to_string(),
            vendor: Vendor::Nike,
            listings: vec![ListingConfig {
                country: Country::US,
                url: "https://www.nike.com/af1".to_string(),
                fallback_price: 115.0,
            }],
        };
        build_record(&product, &[], &[], Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap())
    }

    fn sink(server: &MockServer) -> SupabaseSink {
        SupabaseSink::new(
            Client::new(),
            Some(SupabaseCredentials {
                url: server.uri(),
                key: "service-key".to_string(),
                kind: SupabaseKeyKind::ServiceRole,
            }),
        )
    }

    #[tokio::test]
    async fn test_save_upserts_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/precios"))
            .and(query_param("on_conflict", "product_id,scrape_date"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .and(body_partial_json(serde_json::json!({
                "product_id": "air_force_1",
                "scrape_date": "2026-10-16"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(sink(&server).save(&record()).await.unwrap(), SaveOutcome::Saved);
    }

    #[tokio::test]
    async fn test_rls_violation_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "code": "42501",
                "message": "new row violates row-level security policy for table \"precios\""
            })))
            .mount(&server)
            .await;

        let err = sink(&server).save(&record()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SinkError>(),
            Some(SinkError::RowLevelSecurity { .. })
        ));
    }

    #[tokio::test]
    async fn test_other_failures_are_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = sink(&server).save(&record()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SinkError>(),
            Some(SinkError::Rejected { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_disabled_sink_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let mut settings = Settings::from_toml("").unwrap();
        settings.supabase_url = Some(server.uri());
        settings.supabase_key = Some("anon".to_string());

        let sink = SupabaseSink::from_settings(&settings, Client::new());
        assert!(!sink.enabled());
        assert_eq!(sink.save(&record()).await.unwrap(), SaveOutcome::Skipped);
        assert!(sink.latest_rates().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flag_without_credentials_disables_sink() {
        let mut settings = Settings::from_toml("").unwrap();
        settings.save_to_supabase = true;
        let sink = SupabaseSink::from_settings(&settings, Client::new());
        assert!(!sink.enabled());
    }

    #[tokio::test]
    async fn test_latest_rates_reads_last_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/precios"))
            .and(query_param("order", "scraped_at.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "data": {
                    "exchange_rates": {
                        "USD/ARS": [{"base": "USD", "quote": "ARS", "kind": "oficial", "name": "Oficial", "buy": 1000.0, "sell": 1040.0, "source": "dolarapi", "updated_at": null}]
                    }
                }
            }])))
            .mount(&server)
            .await;

        let rates = sink(&server).latest_rates().await.unwrap().unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].kind, RateKind::Oficial);
        assert_eq!(rates[0].quote, Currency::ARS);
        assert_eq!(rates[0].source, "supabase");
    }
}
