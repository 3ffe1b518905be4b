use once_cell::sync::Lazy;
use regex::Regex;

/// Patterns for a single price label, most specific first
static TEXT_PRICE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\$\s*(\d+(?:[.,]\d+)*)",
        r"(\d+(?:[.,]\d+)*)\s*\$",
        r"(\d+(?:[.,]\d+)*)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid price regex"))
    .collect()
});

/// Patterns for scanning a whole page when no element matched
static CONTENT_PRICE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\$\s*(\d+(?:[.,]\d+)*)",
        r"(?i)precio[^\d]+(\d+(?:[.,]\d+)*)",
        r"(?i)price[^\d]+(\d+(?:[.,]\d+)*)",
        r"(?i)valor[^\d]+(\d+(?:[.,]\d+)*)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid content price regex"))
    .collect()
});

static DOLLAR_AMOUNT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s*(\d+(?:\.\d+)?)").expect("Invalid dollar regex")
});

pub static SHORT_DOLLAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s*\d+").expect("Invalid short dollar regex")
});

/// Extract a price from the text of a price element such as `$ 199.999`,
/// `US$115.00` or `1.234,56 $`.
pub fn extract_price_from_text(text: &str) -> Option<f64> {
    for pattern in TEXT_PRICE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            let raw = captures.get(1)?.as_str().trim();
            if let Some(value) = normalize_number(raw).and_then(|n| n.parse::<f64>().ok()) {
                return Some(value);
            }
        }
    }
    None
}

/// Whole-page fallback: the first hit has every separator dropped and is read
/// as an integer amount.
pub fn extract_price_from_content(content: &str) -> Option<f64> {
    for pattern in CONTENT_PRICE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(content) {
            let digits: String = captures[1].chars().filter(|c| c.is_ascii_digit()).collect();
            if !digits.is_empty() {
                if let Ok(value) = digits.parse::<f64>() {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// `$115` or `$115.50` out of a short label; no thousands handling.
pub fn extract_dollar_amount(text: &str) -> Option<f64> {
    DOLLAR_AMOUNT_REGEX
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
}

/// Rewrites a captured number into a plain `1234.56` form.
fn normalize_number(raw: &str) -> Option<String> {
    let has_comma = raw.contains(',');
    let has_dot = raw.contains('.');

    let normalized = match (has_comma, has_dot) {
        (true, true) => {
            let comma = raw.find(',')?;
            let dot = raw.find('.')?;
            if comma < dot {
                // 1,234.56
                raw.replace(',', "")
            } else {
                // 1.234,56
                raw.replace('.', "").replace(',', ".")
            }
        }
        (true, false) => {
            let after_first = raw.split(',').nth(1).unwrap_or("");
            if after_first.len() > 2 {
                raw.replace(',', "")
            } else {
                raw.replace(',', ".")
            }
        }
        (false, true) => {
            // 199.999 and 1.299.999 are dot-grouped thousands
            let groups: Vec<&str> = raw.split('.').collect();
            if groups[1..].iter().all(|g| g.len() == 3) {
                raw.replace('.', "")
            } else {
                raw.to_string()
            }
        }
        (false, false) => raw.to_string(),
    };

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_price_us_format() {
        assert_eq!(extract_price_from_text("$115.00"), Some(115.0));
        assert_eq!(extract_price_from_text("US$ 1,234.56"), Some(1234.56));
        assert_eq!(extract_price_from_text("$100"), Some(100.0));
    }

    #[test]
    fn test_extract_price_argentine_format() {
        assert_eq!(extract_price_from_text("$ 199.999"), Some(199_999.0));
        assert_eq!(extract_price_from_text("$1.299.999"), Some(1_299_999.0));
        assert_eq!(extract_price_from_text("$ 1.234,56"), Some(1234.56));
    }

    #[test]
    fn test_extract_price_comma_rules() {
        assert_eq!(extract_price_from_text("199,999 $"), Some(199_999.0));
        assert_eq!(extract_price_from_text("1,23"), Some(1.23));
    }

    #[test]
    fn test_extract_price_without_currency_symbol() {
        assert_eq!(extract_price_from_text("Precio: 89.5"), Some(89.5));
        assert_eq!(extract_price_from_text("no price here"), None);
        assert_eq!(extract_price_from_text(""), None);
    }

    #[test]
    fn test_extract_price_from_content_strips_separators() {
        let html = r#"<div>Envío gratis</div><span class="x">$ 179.999</span>"#;
        assert_eq!(extract_price_from_content(html), Some(179_999.0));

        let html = r#"<script>{"Precio": "149.999,00"}</script>"#;
        assert_eq!(extract_price_from_content(html), Some(14_999_900.0));

        assert_eq!(extract_price_from_content("<p>nothing</p>"), None);
    }

    #[test]
    fn test_extract_dollar_amount() {
        assert_eq!(extract_dollar_amount("Sale $110.00"), Some(110.0));
        assert_eq!(extract_dollar_amount("110.00"), None);
    }
}
