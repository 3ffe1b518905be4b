use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

pub const PRICES_UPDATED: &str = "prices.updated";

pub fn create_payload(product_ids: &[String], scraped_at: DateTime<Utc>) -> Value {
    json!({
        "event": PRICES_UPDATED,
        "products": product_ids,
        "scraped_at": scraped_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_payload_shape() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let payload = create_payload(&["air_force_1".to_string()], at);
        assert_eq!(
            payload,
            json!({
                "event": "prices.updated",
                "products": ["air_force_1"],
                "scraped_at": "2026-10-16T09:00:00Z"
            })
        );
    }
}
