use async_trait::async_trait;
use scraper::Html;
use tracing::info;

use crate::models::{Country, Vendor};
use crate::parsers::{extract_dollar_amount, extract_price_from_content, extract_price_from_text};
use crate::scrapers::page::{
    price_from_all_matches, price_from_json_ld, price_from_selectors, price_from_short_dollar_text,
};
use crate::scrapers::{ProductScraper, RequestProfile};

const MAIN_PRICE: &str = "[data-testid=\"main-price\"]";
const ANY_TESTID_PRICE: &str = "[data-testid*=\"price\"]";

const AR_SELECTORS: &[&str] = &[
    "[data-testid=\"product-price\"]",
    "[data-testid=\"price-component\"]",
    "div.gl-price-item--sale",
    ".product-price-container .price",
    ".product-price",
    ".gl-price-item",
    ".gl-price__value",
    "[data-auto-id=\"product-price\"]",
    "[data-auto-id=\"sale-price\"]",
];

const US_SELECTORS: &[&str] = &[
    "[data-testid=\"product-price\"]",
    "[data-testid=\"price-component\"]",
    "div.gl-price-item--sale",
    ".gl-price-item",
    ".gl-price__value",
    "[data-auto-id=\"product-price\"]",
    "[data-auto-id=\"sale-price\"]",
    ".product-price",
];

pub struct AdidasScraper;

impl AdidasScraper {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AdidasScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductScraper for AdidasScraper {
    fn vendor(&self) -> Vendor {
        Vendor::Adidas
    }

    fn request_profile(&self, country: Country) -> RequestProfile {
        match country {
            Country::AR => RequestProfile {
                cookies: vec![("accept_cookies", "true")],
                referer: Some("https://www.adidas.com.ar/ropa-seleccion-argentina"),
            },
            _ => RequestProfile {
                cookies: vec![("geo_country", "US"), ("languageLocale", "en_US")],
                referer: Some("https://www.adidas.com/us/soccer-jerseys"),
            },
        }
    }

    fn extract_price(&self, html: &str, country: Country) -> Option<f64> {
        let document = Html::parse_document(html);

        let tagged = price_from_all_matches(&document, MAIN_PRICE, extract_price_from_text)
            .or_else(|| price_from_all_matches(&document, ANY_TESTID_PRICE, extract_price_from_text));
        if tagged.is_some() {
            return tagged;
        }

        match country {
            Country::AR => price_from_selectors(&document, AR_SELECTORS, extract_price_from_text)
                .or_else(|| price_from_json_ld(&document))
                .or_else(|| {
                    info!("Trying to extract Adidas AR price from entire page content...");
                    extract_price_from_content(html)
                }),
            _ => price_from_selectors(&document, US_SELECTORS, extract_price_from_text)
                .or_else(|| price_from_json_ld(&document))
                .or_else(|| price_from_short_dollar_text(&document, extract_dollar_amount)),
        }
    }
}
