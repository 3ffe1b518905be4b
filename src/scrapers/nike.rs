use async_trait::async_trait;
use scraper::Html;
use tracing::info;

use crate::models::{Country, Vendor};
use crate::parsers::{extract_dollar_amount, extract_price_from_content, extract_price_from_text};
use crate::scrapers::page::{
    price_from_json_ld, price_from_selectors, price_from_short_dollar_text,
};
use crate::scrapers::{ProductScraper, RequestProfile};

/// nike.com.ar is a VTEX storefront; the selling price lives in its own span.
const AR_SELECTORS: &[&str] = &[
    ".vtex-product-price-1-x-sellingPriceValue",
    ".vtex-product-price-1-x-currencyContainer",
    ".vtex-product-price-1-x-sellingPrice",
    ".product-price",
    ".product-price__wrapper",
    ".price-tag-text",
    ".price",
    ".price-best-price",
    "[data-testid=\"price\"]",
    ".product__price",
];

const US_SELECTORS: &[&str] = &[
    "div#price-container",
    "div.price-container",
    "[data-test=\"product-price\"]",
    ".product-price",
    ".product-price__wrapper",
    ".css-b9fpep",
    ".css-1eqfhge",
    ".css-xf3ahq",
    ".price-container",
    ".price",
];

pub struct NikeScraper;

impl NikeScraper {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NikeScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductScraper for NikeScraper {
    fn vendor(&self) -> Vendor {
        Vendor::Nike
    }

    fn request_profile(&self, country: Country) -> RequestProfile {
        match country {
            Country::AR => RequestProfile {
                cookies: vec![("accept_cookies", "true")],
                referer: None,
            },
            _ => RequestProfile {
                cookies: vec![
                    ("NIKE_COMMERCE_COUNTRY", "US"),
                    ("NIKE_COMMERCE_LANG_LOCALE", "en_US"),
                ],
                referer: None,
            },
        }
    }

    fn extract_price(&self, html: &str, country: Country) -> Option<f64> {
        let document = Html::parse_document(html);
        match country {
            Country::AR => extract_argentina(&document, html),
            _ => extract_us(&document),
        }
    }
}

fn extract_argentina(document: &Html, html: &str) -> Option<f64> {
    price_from_selectors(document, AR_SELECTORS, extract_price_from_text)
        .or_else(|| price_from_json_ld(document))
        .or_else(|| price_from_short_dollar_text(document, extract_price_from_text))
        .or_else(|| {
            info!("Trying to extract Nike AR price from entire page content...");
            extract_price_from_content(html)
        })
}

fn extract_us(document: &Html) -> Option<f64> {
    price_from_selectors(document, US_SELECTORS, extract_price_from_text)
        .or_else(|| price_from_json_ld(document))
        .or_else(|| price_from_short_dollar_text(document, extract_dollar_amount))
}
