use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER};
use reqwest::Client;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ListingConfig, ProductConfig};
use crate::models::{Country, PriceObservation, Vendor};
use crate::utils::http::fetch_with_retry;

mod adidas;
mod capture;
mod nike;
pub mod page;

pub use adidas::AdidasScraper;
pub use capture::CaptureWriter;
pub use nike::NikeScraper;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("No scraper registered for vendor {0}")]
    UnsupportedVendor(Vendor),

    #[error("Failed to load {url}: {cause:#}")]
    Fetch { url: String, cause: anyhow::Error },

    #[error("Failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("No price found on {vendor} {country} page")]
    PriceNotFound { vendor: Vendor, country: Country },
}

/// Shared per-run state handed to every scraper.
pub struct ScrapeContext {
    pub client: Client,
    pub captures: Option<CaptureWriter>,
    pub max_attempts: u32,
}

/// Cookies and headers a storefront expects from a visitor of `country`.
#[derive(Debug, Clone, Default)]
pub struct RequestProfile {
    pub cookies: Vec<(&'static str, &'static str)>,
    pub referer: Option<&'static str>,
}

impl RequestProfile {
    pub fn headers(&self, country: Country) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(country.accept_language()));
        headers.insert(
            HeaderName::from_static("sec-ch-ua"),
            HeaderValue::from_static("\"Chromium\";v=\"122\", \"Google Chrome\";v=\"122\""),
        );
        headers.insert(HeaderName::from_static("sec-ch-ua-mobile"), HeaderValue::from_static("?0"));
        headers.insert(
            HeaderName::from_static("sec-ch-ua-platform"),
            HeaderValue::from_static("\"macOS\""),
        );

        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.insert(COOKIE, value);
            }
        }

        if let Some(referer) = self.referer {
            headers.insert(REFERER, HeaderValue::from_static(referer));
        }

        headers
    }
}

#[async_trait]
pub trait ProductScraper: Send + Sync {
    fn vendor(&self) -> Vendor;

    fn request_profile(&self, country: Country) -> RequestProfile;

    /// Vendor-specific extraction cascade over a fetched page.
    fn extract_price(&self, html: &str, country: Country) -> Option<f64>;

    async fn load_page(&self, ctx: &ScrapeContext, listing: &ListingConfig) -> Result<String, ScrapeError> {
        let headers = self.request_profile(listing.country).headers(listing.country);
        let response = fetch_with_retry(&ctx.client, &listing.url, &headers, ctx.max_attempts)
            .await
            .map_err(|cause| ScrapeError::Fetch {
                url: listing.url.clone(),
                cause,
            })?;

        response.text().await.map_err(|source| ScrapeError::Body {
            url: listing.url.clone(),
            source,
        })
    }

    /// One page load and extraction. Never fails: any error yields the
    /// listing's fallback price.
    async fn scrape_listing(
        &self,
        ctx: &ScrapeContext,
        product: &ProductConfig,
        listing: &ListingConfig,
    ) -> PriceObservation {
        let vendor = self.vendor();
        info!(
            "Scraping {} {} ({}): {}",
            vendor,
            listing.country,
            listing.country.locale(),
            listing.url
        );

        let fallback = |capture: Option<String>, at| {
            warn!(
                "Using fallback price {} {} for {} {}",
                listing.fallback_price,
                listing.country.currency(),
                product.name,
                listing.country
            );
            PriceObservation::fallback(&product.id, listing.country, listing.fallback_price, &listing.url, at)
                .with_capture(capture)
        };

        let html = match self.load_page(ctx, listing).await {
            Ok(html) => html,
            Err(e) => {
                error!("Error scraping {} {}: {}", vendor, listing.country, e);
                return fallback(None, Utc::now());
            }
        };

        // The capture file and the observation share one timestamp.
        let observed_at = Utc::now();
        let capture = match &ctx.captures {
            Some(writer) => writer.save(vendor, listing.country, &html, observed_at),
            None => None,
        };

        match self.extract_price(&html, listing.country) {
            Some(value) if value.is_finite() && value > 0.0 => {
                info!(
                    "Successfully extracted price for {} {}: {} {}",
                    product.name,
                    listing.country,
                    value,
                    listing.country.currency()
                );
                PriceObservation::scraped(&product.id, listing.country, value, &listing.url, observed_at)
                    .with_capture(capture)
            }
            _ => {
                error!(
                    "{}",
                    ScrapeError::PriceNotFound {
                        vendor,
                        country: listing.country,
                    }
                );
                fallback(capture, observed_at)
            }
        }
    }

    /// Every listing of `product`, one after another.
    async fn scrape(&self, ctx: &ScrapeContext, product: &ProductConfig) -> Vec<PriceObservation> {
        info!("Starting {} scraper for {}", self.vendor(), product.name);
        let mut observations = Vec::with_capacity(product.listings.len());
        for listing in &product.listings {
            observations.push(self.scrape_listing(ctx, product, listing).await);
        }
        observations
    }
}

pub fn default_scrapers() -> Vec<Box<dyn ProductScraper>> {
    vec![Box::new(NikeScraper::new()), Box::new(AdidasScraper::new())]
}

pub fn scraper_for(
    scrapers: &[Box<dyn ProductScraper>],
    vendor: Vendor,
) -> Result<&dyn ProductScraper, ScrapeError> {
    scrapers
        .iter()
        .find(|s| s.vendor() == vendor)
        .map(|s| s.as_ref())
        .ok_or(ScrapeError::UnsupportedVendor(vendor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceOrigin;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedScraper;

    #[async_trait]
    impl ProductScraper for FixedScraper {
        fn vendor(&self) -> Vendor {
            Vendor::Nike
        }

        fn request_profile(&self, _country: Country) -> RequestProfile {
            RequestProfile {
                cookies: vec![("accept_cookies", "true"), ("geo", "AR")],
                referer: Some("https://shop.example/"),
            }
        }

        fn extract_price(&self, html: &str, _country: Country) -> Option<f64> {
            crate::parsers::extract_price_from_text(html)
        }
    }

    fn product(server: &MockServer) -> ProductConfig {
        ProductConfig {
            id: "air_force_1".to_string(),
            name: "Nike Air Force 1".to_string(),
            vendor: Vendor::Nike,
            listings: vec![
                ListingConfig {
                    country: Country::AR,
                    url: format!("{}/ar", server.uri()),
                    fallback_price: 199_999.0,
                },
                ListingConfig {
                    country: Country::US,
                    url: format!("{}/us", server.uri()),
                    fallback_price: 115.0,
                },
            ],
        }
    }

    fn context() -> ScrapeContext {
        ScrapeContext {
            client: Client::new(),
            captures: None,
            max_attempts: 1,
        }
    }

    #[test]
    fn test_profile_headers() {
        let headers = FixedScraper.request_profile(Country::AR).headers(Country::AR);
        assert_eq!(headers[ACCEPT_LANGUAGE], "es-AR,es;q=0.9");
        assert_eq!(headers[COOKIE], "accept_cookies=true; geo=AR");
        assert_eq!(headers[REFERER], "https://shop.example/");
        assert_eq!(headers["sec-ch-ua-mobile"], "?0");
    }

    #[tokio::test]
    async fn test_scrape_uses_fallback_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ar"))
            .and(header("cookie", "accept_cookies=true; geo=AR"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<span>$ 189.999</span>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/us"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let observations = FixedScraper.scrape(&context(), &product(&server)).await;

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].country, Country::AR);
        assert_eq!(observations[0].value, 189_999.0);
        assert_eq!(observations[0].origin, PriceOrigin::Scraped);
        assert!(observations[0].description.starts_with("Scraped from "));

        assert_eq!(observations[1].country, Country::US);
        assert_eq!(observations[1].value, 115.0);
        assert_eq!(observations[1].origin, PriceOrigin::Fallback);
    }

    #[tokio::test]
    async fn test_scrape_falls_back_when_page_has_no_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Agotado</p>"))
            .mount(&server)
            .await;

        let observations = FixedScraper.scrape(&context(), &product(&server)).await;
        assert!(observations.iter().all(|o| o.is_fallback()));
        assert_eq!(observations[0].value, 199_999.0);
    }

    #[tokio::test]
    async fn test_capture_shares_observation_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<span>$ 189.999</span>"))
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join(format!("price-scraper-scrape-captures-{}", std::process::id()));
        let ctx = ScrapeContext {
            captures: Some(CaptureWriter::new(&dir).unwrap()),
            ..context()
        };
        let product = product(&server);

        let observation = FixedScraper.scrape_listing(&ctx, &product, &product.listings[0]).await;
        let capture = observation.capture.clone().unwrap();
        let expected = format!("nike_ar_{}.html", observation.observed_at.format("%Y%m%d_%H%M%S"));
        assert!(capture.ends_with(&expected), "{} does not end with {}", capture, expected);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_scraper_for_vendor() {
        let scrapers = default_scrapers();
        assert_eq!(scraper_for(&scrapers, Vendor::Adidas).unwrap().vendor(), Vendor::Adidas);

        let only_nike: Vec<Box<dyn ProductScraper>> = vec![Box::new(FixedScraper)];
        assert!(matches!(
            scraper_for(&only_nike, Vendor::Adidas),
            Err(ScrapeError::UnsupportedVendor(Vendor::Adidas))
        ));
    }
}
