//! Normalization rules applied uniformly to every strategy's output.
//!
//! Pure, synchronous functions. Whatever path produced a record — platform
//! selectors, structured data, or an AI response — it passes through here so
//! the output contract is identical regardless of source.

use crate::record::{ProductRecord, WeightUnit};
use regex::Regex;

/// Inflation factor used when a page carries no genuine compare-at price.
///
/// Tunable: chosen so a discount is always displayable, not derived from any
/// market property.
pub const COMPARE_AT_FACTOR: f64 = 1.2;

/// Fallback weight when no title keyword matches.
pub const DEFAULT_WEIGHT: (&str, WeightUnit) = ("200", WeightUnit::G);

/// Currency prefixes recognized when carrying a symbol onto an inferred
/// compare-at price. Longer strings first so `Rs.` wins over `Rs`.
const CURRENCY_PREFIXES: &[&str] = &["Rs.", "Rs", "$", "€", "£", "₹", "¥"];

/// Keyword table for weight estimation. First match wins; matching is on
/// lowercase containment.
const WEIGHT_RULES: &[(&[&str], &str, WeightUnit)] = &[
    (&["laptop", "notebook", "macbook"], "2", WeightUnit::Kg),
    (&["phone", "mobile", "smartphone"], "200", WeightUnit::G),
    (&["tablet", "ipad"], "500", WeightUnit::G),
    (&["watch", "smartwatch"], "100", WeightUnit::G),
    (&["headphone", "earphone", "earbud", "airpod"], "50", WeightUnit::G),
    (&["shirt", "t-shirt", "tshirt", "tee", "top", "blouse"], "200", WeightUnit::G),
    (&["jeans", "trouser", "pant", "chino"], "500", WeightUnit::G),
    (&["dress", "skirt", "saree", "kurta"], "300", WeightUnit::G),
    (&["shoe", "sneaker", "boot", "sandal", "heel"], "1", WeightUnit::Kg),
    (&["jacket", "coat", "hoodie", "sweater", "sweatshirt"], "800", WeightUnit::G),
    (&["book", "novel", "paperback"], "300", WeightUnit::G),
    (&["bag", "backpack", "handbag", "wallet"], "600", WeightUnit::G),
];

/// Guarantee a compare-at price on the record.
///
/// A genuine strike-through/MRP value from the page is returned unchanged.
/// Otherwise the selling price is inflated by [`COMPARE_AT_FACTOR`] and
/// formatted to two decimals, keeping any currency prefix the selling price
/// carried. Unparseable or non-positive prices yield the empty string.
pub fn ensure_compare_at_price(price: &str, compare_at_price: &str) -> String {
    let existing = compare_at_price.trim();
    if !existing.is_empty() {
        return existing.to_string();
    }

    let symbol = detect_currency_prefix(price);
    match parse_price_value(price) {
        Some(v) if v > 0.0 => {
            // Work in whole cents so two-decimal formatting cannot round the
            // inflated value back down onto the selling price (e.g. 0.01).
            let mut cents = (v * COMPARE_AT_FACTOR * 100.0).round();
            if cents <= (v * 100.0).round() {
                cents += 1.0;
            }
            format!("{symbol}{:.2}", cents / 100.0)
        }
        _ => String::new(),
    }
}

/// Estimate shipping weight from the product title.
///
/// Total function: any input, including the empty string, yields a non-empty
/// `(value, unit)` pair. Falls back to [`DEFAULT_WEIGHT`].
pub fn estimate_weight(product_name: &str) -> (String, WeightUnit) {
    let lower = product_name.to_lowercase();
    for (keywords, value, unit) in WEIGHT_RULES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return ((*value).to_string(), *unit);
        }
    }
    (DEFAULT_WEIGHT.0.to_string(), DEFAULT_WEIGHT.1)
}

/// Strip markdown emphasis markers and collapse repeated punctuation and
/// whitespace. Idempotent.
pub fn clean_product_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev: Option<char> = None;

    for c in name.chars() {
        // Markdown artifacts from AI output or page copy.
        if matches!(c, '*' | '_' | '`' | '#') {
            continue;
        }
        let c = if c.is_whitespace() { ' ' } else { c };
        let repeatable = matches!(c, '!' | '?' | '.' | ',' | ';' | ':' | '-' | ' ');
        if repeatable && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }

    out.trim().to_string()
}

/// Run a record through every rule: name cleanup, compare-at inference, and
/// weight estimation when the extractor left weight empty.
pub fn normalize_record(mut record: ProductRecord) -> ProductRecord {
    record.product_name = clean_product_name(&record.product_name);
    record.compare_at_price =
        ensure_compare_at_price(&record.price, &record.compare_at_price);
    if record.weight.trim().is_empty() {
        let (value, unit) = estimate_weight(&record.product_name);
        record.weight = value;
        record.weight_unit = unit;
    }
    record
}

/// First recognized currency prefix found in a price string, or `""`.
fn detect_currency_prefix(price: &str) -> &'static str {
    for sym in CURRENCY_PREFIXES {
        if price.contains(sym) {
            return sym;
        }
    }
    ""
}

/// Pull the first numeric run out of a price string, tolerating thousands
/// separators. `None` when there is no digit to be found.
pub fn parse_price_value(text: &str) -> Option<f64> {
    let re = Regex::new(r"\d[\d,]*\.?\d*").expect("price value regex is valid");
    let m = re.find(text)?;
    m.as_str().replace(',', "").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_at_passes_through_genuine_value() {
        assert_eq!(ensure_compare_at_price("19.99", "49.99"), "49.99");
        assert_eq!(ensure_compare_at_price("19.99", "  49.99  "), "49.99");
    }

    #[test]
    fn compare_at_inflates_plain_price() {
        assert_eq!(ensure_compare_at_price("19.99", ""), "23.99");
        assert_eq!(ensure_compare_at_price("100", ""), "120.00");
    }

    #[test]
    fn compare_at_keeps_currency_prefix() {
        assert_eq!(ensure_compare_at_price("$50.00", ""), "$60.00");
        assert_eq!(ensure_compare_at_price("₹1,299", ""), "₹1558.80");
        assert_eq!(ensure_compare_at_price("Rs. 500", ""), "Rs.600.00");
    }

    #[test]
    fn compare_at_empty_on_garbage() {
        assert_eq!(ensure_compare_at_price("", ""), "");
        assert_eq!(ensure_compare_at_price("call for price", ""), "");
        assert_eq!(ensure_compare_at_price("0", ""), "");
    }

    #[test]
    fn inferred_compare_at_stays_above_sub_dime_prices() {
        // Two-decimal formatting would otherwise round the ×1.2 value back
        // down onto the price itself for anything under five cents.
        assert_eq!(ensure_compare_at_price("0.01", ""), "0.02");
        assert_eq!(ensure_compare_at_price("0.02", ""), "0.03");
        assert_eq!(ensure_compare_at_price("0.04", ""), "0.05");
    }

    #[test]
    fn inferred_compare_at_exceeds_price() {
        for price in ["0.01", "19.99", "1,299.50", "$7"] {
            let out = ensure_compare_at_price(price, "");
            let p = parse_price_value(price).unwrap();
            let c = parse_price_value(&out).unwrap();
            assert!(c > p, "{out} should exceed {price}");
        }
    }

    #[test]
    fn weight_is_total() {
        let (v, _) = estimate_weight("");
        assert!(!v.is_empty());
        let (v, u) = estimate_weight("Gaming Laptop 16GB");
        assert_eq!((v.as_str(), u), ("2", WeightUnit::Kg));
        let (v, u) = estimate_weight("Classic Cotton Shirt");
        assert_eq!((v.as_str(), u), ("200", WeightUnit::G));
        let (v, u) = estimate_weight("mystery item");
        assert_eq!((v.as_str(), u), ("200", WeightUnit::G));
    }

    #[test]
    fn weight_table_order_encodes_priority() {
        // "laptop" outranks later keyword hits in the same title.
        let (v, u) = estimate_weight("Laptop bag");
        assert_eq!((v.as_str(), u), ("2", WeightUnit::Kg));
    }

    #[test]
    fn name_cleanup_strips_markdown() {
        assert_eq!(clean_product_name("**Cool** _Widget_"), "Cool Widget");
        assert_eq!(clean_product_name("# Heading Product"), "Heading Product");
    }

    #[test]
    fn name_cleanup_collapses_punctuation_and_whitespace() {
        assert_eq!(clean_product_name("Wow!!!  So   good..."), "Wow! So good.");
        assert_eq!(clean_product_name("  spaced   out  "), "spaced out");
    }

    #[test]
    fn name_cleanup_is_idempotent() {
        for s in ["**Bold!!** name", "plain", "a.. b,, c??", "¡weird! — text"] {
            let once = clean_product_name(s);
            assert_eq!(clean_product_name(&once), once);
        }
    }

    #[test]
    fn normalize_record_fills_weight_and_compare_at() {
        let record = ProductRecord {
            product_name: "**Widget** phone".into(),
            price: "19.99".into(),
            ..Default::default()
        };
        let out = normalize_record(record);
        assert_eq!(out.product_name, "Widget phone");
        assert_eq!(out.compare_at_price, "23.99");
        assert_eq!(out.weight, "200");
        assert_eq!(out.weight_unit, WeightUnit::G);
    }
}
