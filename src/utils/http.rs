use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::Settings;

pub fn create_client(settings: &Settings) -> Result<Client> {
    let client = ClientBuilder::new()
        .user_agent(&settings.user_agent)
        .timeout(Duration::from_secs(settings.request_timeout_seconds))
        .pool_max_idle_per_host(2)
        .build()?;

    Ok(client)
}

/// GET `url` with `headers`, retrying non-success responses with exponential
/// backoff. `max_attempts` counts the first try.
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    headers: &HeaderMap,
    max_attempts: u32,
) -> Result<Response> {
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;
    let mut last_error = None;

    while attempts < max_attempts {
        match client.get(url).headers(headers.clone()).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    return Ok(response);
                } else {
                    let status = response.status();
                    warn!("HTTP error {}: {}", status, url);
                    last_error = Some(anyhow::anyhow!("HTTP error: {}", status));
                }
            }
            Err(e) => {
                error!("Request failed for {}: {}", url, e);
                last_error = Some(e.into());
            }
        }

        attempts += 1;
        if attempts < max_attempts {
            let delay = retry_delay(attempts);
            warn!("Retrying in {:?}... (attempt {}/{})", delay, attempts + 1, max_attempts);
            sleep(delay).await;
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Max retries exceeded")))
        .context(format!("Failed to fetch {} after {} attempts", url, max_attempts))
}

/// 2, 4, 8 ... seconds, capped at 64.
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.min(6)))
}
