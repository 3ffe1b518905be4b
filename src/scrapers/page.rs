//! Extraction steps shared by the storefront scrapers. Each step returns the
//! first price it can read, so vendors chain them into a cascade.

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, info};

use crate::parsers::{clean_text, extract_price_from_text, SHORT_DOLLAR_REGEX};

/// Labels longer than this are page sections, not prices.
const SHORT_TEXT_LIMIT: usize = 20;

pub type PriceParser = fn(&str) -> Option<f64>;

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// First selector whose first match parses as a price.
pub fn price_from_selectors(document: &Html, selectors: &[&str], parse: PriceParser) -> Option<f64> {
    for selector_str in selectors {
        let selector = match Selector::parse(selector_str) {
            Ok(selector) => selector,
            Err(_) => {
                debug!("Skipping invalid selector {}", selector_str);
                continue;
            }
        };

        if let Some(element) = document.select(&selector).next() {
            let text = element_text(element);
            info!("Found price text with selector {}: {}", selector_str, text);
            if let Some(price) = parse(&text) {
                return Some(price);
            }
        }
    }
    None
}

/// Every element matching `selector`, in document order.
pub fn price_from_all_matches(document: &Html, selector: &str, parse: PriceParser) -> Option<f64> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(element_text)
        .find_map(|text| parse(&text))
}

/// First element whose whole text is a short `$ 123` style label.
pub fn price_from_short_dollar_text(document: &Html, parse: PriceParser) -> Option<f64> {
    let all = Selector::parse("body *").ok()?;
    for element in document.select(&all) {
        let name = element.value().name();
        if name == "script" || name == "style" {
            continue;
        }
        let text = element_text(element);
        if text.chars().count() < SHORT_TEXT_LIMIT && SHORT_DOLLAR_REGEX.is_match(&text) {
            info!("Found short price label: {}", text);
            if let Some(price) = parse(&text) {
                return Some(price);
            }
        }
    }
    None
}

/// `offers.price` (or `lowPrice`) of the first schema.org Product in the
/// page's JSON-LD blocks.
pub fn price_from_json_ld(document: &Html) -> Option<f64> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    for script in document.select(&selector) {
        let script_text = script.text().collect::<String>();
        match serde_json::from_str::<Value>(&script_text) {
            Ok(data) => {
                if let Some(price) = find_product_price(&data) {
                    info!("Found price in JSON-LD: {}", price);
                    return Some(price);
                }
            }
            Err(e) => debug!("Unreadable JSON-LD block: {}", e),
        }
    }
    None
}

fn find_product_price(data: &Value) -> Option<f64> {
    match data {
        Value::Array(items) => items.iter().find_map(find_product_price),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                if let Some(price) = find_product_price(graph) {
                    return Some(price);
                }
            }
            if is_product(map.get("@type")) {
                if let Some(offers) = map.get("offers") {
                    return offer_price(offers);
                }
            }
            None
        }
        _ => None,
    }
}

fn is_product(kind: Option<&Value>) -> bool {
    match kind {
        Some(Value::String(s)) => s == "Product",
        Some(Value::Array(kinds)) => kinds.iter().any(|k| k.as_str() == Some("Product")),
        _ => false,
    }
}

fn offer_price(offers: &Value) -> Option<f64> {
    match offers {
        Value::Array(items) => items.iter().find_map(offer_price),
        Value::Object(map) => ["price", "lowPrice"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(json_number),
        _ => None,
    }
}

fn json_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().or_else(|| extract_price_from_text(s)),
        _ => None,
    };
    number.filter(|v| *v > 0.0)
}
