pub mod payload;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{error, info};

use crate::config::Settings;
use payload::create_payload;

/// Tells the downstream site that fresh prices are available.
#[derive(Debug, Clone)]
pub struct Revalidator {
    url: String,
    secret: Option<String>,
}

impl Revalidator {
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            url: url.into(),
            secret,
        }
    }

    /// `None` when no revalidation URL is configured.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings
            .revalidate_target()
            .map(|(url, secret)| Self::new(url, secret.map(str::to_string)))
    }

    pub async fn trigger(
        &self,
        client: &Client,
        product_ids: &[String],
        scraped_at: DateTime<Utc>,
    ) -> Result<()> {
        let payload = create_payload(product_ids, scraped_at);

        let mut request = client.post(&self.url).json(&payload);
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        let response = request
            .send()
            .await
            .context("Failed to send revalidation webhook")?;

        if response.status().is_success() {
            info!("Revalidation triggered for {} products", product_ids.len());
            Ok(())
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("Revalidation webhook failed with status {}: {}", status, error_text);
            Err(anyhow::anyhow!("Revalidation webhook failed: {} - {}", status, error_text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_trigger_with_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/revalidate"))
            .and(header("authorization", "Bearer s3cret"))
            .and(body_json(serde_json::json!({
                "event": "prices.updated",
                "products": ["air_force_1", "argentina_jersey"],
                "scraped_at": "2026-10-16T09:00:00Z"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let revalidator = Revalidator::new(format!("{}/api/revalidate", server.uri()), Some("s3cret".to_string()));
        let ids = vec!["air_force_1".to_string(), "argentina_jersey".to_string()];
        revalidator.trigger(&Client::new(), &ids, at()).await.unwrap();
    }

    #[tokio::test]
    async fn test_trigger_without_secret_sends_no_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let revalidator = Revalidator::new(server.uri(), None);
        revalidator
            .trigger(&Client::new(), &["air_force_1".to_string()], at())
            .await
            .unwrap();

        let received: Vec<Request> = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = Revalidator::new(server.uri(), None)
            .trigger(&Client::new(), &[], at())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_from_settings_requires_url() {
        let settings = Settings::from_toml("").unwrap();
        assert!(Revalidator::from_settings(&settings).is_none());

        let settings = Settings::from_toml(r#"revalidate_url = "https://site.example/api/revalidate""#).unwrap();
        let revalidator = Revalidator::from_settings(&settings).unwrap();
        assert_eq!(revalidator.url, "https://site.example/api/revalidate");
        assert!(revalidator.secret.is_none());
    }
}
