//! Platform-agnostic extraction from structured data and heuristics.
//!
//! Used when no platform rule matches the URL. Mines the page in priority
//! order, independently per field: JSON-LD product blocks first, then
//! OpenGraph metas, then regex heuristics over the raw HTML, then a generic
//! `<img>` scan as an image top-up.
//!
//! The success bar for trusting this output over the AI fallback is strict:
//! a non-empty name AND at least one image. A title alone is not enough to
//! trust pattern extraction on a layout the heuristics were not written for.

use crate::extract::{element_text, first_attr, push_image};
use crate::normalize::{self, parse_price_value};
use crate::record::ProductRecord;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// Image-count cap for the output record.
pub const MAX_IMAGES: usize = 10;

/// Product fields mined from one JSON-LD block.
#[derive(Debug, Clone, Default)]
struct JsonLdProduct {
    name: String,
    description: String,
    price: String,
    compare_at_price: String,
    images: Vec<String>,
    vendor: String,
    sku: String,
    product_type: String,
}

/// OpenGraph fields relevant to products.
#[derive(Debug, Clone, Default)]
struct OpenGraphData {
    title: String,
    description: String,
    images: Vec<String>,
    price: String,
}

/// The generic, structured-data-first extraction strategy.
#[derive(Debug, Clone, Default)]
pub struct GenericExtractor;

impl GenericExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract a record from raw HTML. Synchronous; parse before awaiting.
    pub fn extract(&self, html: &str, url: &str) -> ProductRecord {
        let document = Html::parse_document(html);

        let jsonld = extract_jsonld_product(&document);
        let og = extract_opengraph(&document);

        let mut record = ProductRecord::default();

        // Name: JSON-LD > og:title > <title> with site suffix stripped.
        record.product_name = first_non_empty(&[
            jsonld.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            og.title.clone(),
            strip_title_suffix(&page_title(&document)),
        ]);

        // Description: JSON-LD > og:description > meta description.
        record.description = first_non_empty(&[
            jsonld
                .as_ref()
                .map(|p| p.description.clone())
                .unwrap_or_default(),
            og.description.clone(),
            first_attr(&document, r#"meta[name="description"]"#, "content"),
        ]);

        // Price: JSON-LD offer > og price > currency-prefixed regex run.
        record.price = first_non_empty(&[
            jsonld.as_ref().map(|p| p.price.clone()).unwrap_or_default(),
            og.price.clone(),
            regex_price(html),
        ]);

        // Compare-at: JSON-LD highPrice > strike-through / MRP-labelled
        // value, accepted only when numerically above the selling price.
        record.compare_at_price = first_non_empty(&[
            jsonld
                .as_ref()
                .map(|p| p.compare_at_price.clone())
                .unwrap_or_default(),
            regex_compare_at(html, &record.price),
        ]);

        // Images: JSON-LD, then OG, then an <img> scan top-up.
        if let Some(p) = &jsonld {
            for img in &p.images {
                push_image(&mut record.images, img, url);
            }
        }
        for img in &og.images {
            push_image(&mut record.images, img, url);
        }
        scan_img_tags(&document, url, &mut record.images);
        record.images.truncate(MAX_IMAGES);

        if let Some(p) = jsonld {
            record.vendor = p.vendor;
            record.sku = p.sku;
            record.product_type = p.product_type;
        }

        debug!(
            name = %record.product_name,
            images = record.images.len(),
            "generic extraction finished"
        );
        normalize::normalize_record(record)
    }

    /// Whether `record` clears the bar for trusting generic extraction.
    pub fn meets_success_bar(record: &ProductRecord) -> bool {
        !record.product_name.is_empty() && !record.images.is_empty()
    }
}

// ── JSON-LD ──────────────────────────────────────────────────────────────────

/// First product-like JSON-LD object in the document, if any.
///
/// An object qualifies when it has a `name` and either `offers` or `image`.
/// `@graph` arrays and top-level arrays are walked.
fn extract_jsonld_product(document: &Html) -> Option<JsonLdProduct> {
    let sel = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    for element in document.select(&sel) {
        let text = element.inner_html();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if let Some(p) = find_product_object(&value) {
            return Some(parse_jsonld_product(p));
        }
    }
    None
}

fn find_product_object(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product_object),
        Value::Object(_) => {
            if let Some(graph) = value.get("@graph").and_then(|g| g.as_array()) {
                if let Some(found) = graph.iter().find_map(find_product_object) {
                    return Some(found);
                }
            }
            let has_name = value.get("name").and_then(|n| n.as_str()).is_some();
            let product_like =
                value.get("offers").is_some() || value.get("image").is_some();
            if has_name && product_like {
                Some(value)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn parse_jsonld_product(v: &Value) -> JsonLdProduct {
    let offer = v.get("offers").and_then(|o| {
        if o.is_array() {
            o.as_array().and_then(|arr| arr.first())
        } else {
            Some(o)
        }
    });

    let price = offer
        .and_then(|o| o.get("price").or_else(|| o.get("lowPrice")))
        .map(json_number_string)
        .unwrap_or_default();
    let compare_at = offer
        .and_then(|o| o.get("highPrice"))
        .map(json_number_string)
        .unwrap_or_default();

    let mut images = Vec::new();
    match v.get("image") {
        Some(Value::String(s)) => images.push(s.clone()),
        Some(Value::Array(arr)) => {
            for item in arr {
                match item {
                    Value::String(s) => images.push(s.clone()),
                    // ImageObject form: {"@type": "ImageObject", "url": ...}
                    Value::Object(_) => {
                        if let Some(u) = item.get("url").and_then(|u| u.as_str()) {
                            images.push(u.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        Some(Value::Object(o)) => {
            if let Some(u) = o.get("url").and_then(|u| u.as_str()) {
                images.push(u.to_string());
            }
        }
        _ => {}
    }

    JsonLdProduct {
        name: v
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string(),
        description: v
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or_default()
            .to_string(),
        price,
        compare_at_price: compare_at,
        images,
        vendor: v
            .get("brand")
            .and_then(|b| b.get("name").and_then(|n| n.as_str()).or_else(|| b.as_str()))
            .unwrap_or_default()
            .to_string(),
        sku: v
            .get("sku")
            .map(json_number_string)
            .unwrap_or_default(),
        product_type: v
            .get("category")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

/// Render a JSON number-or-string field as a plain string.
fn json_number_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

// ── OpenGraph ────────────────────────────────────────────────────────────────

fn extract_opengraph(document: &Html) -> OpenGraphData {
    let mut og = OpenGraphData::default();
    let Ok(sel) = Selector::parse("meta[property], meta[name]") else {
        return og;
    };

    for el in document.select(&sel) {
        let key = el
            .value()
            .attr("property")
            .or_else(|| el.value().attr("name"))
            .unwrap_or_default();
        let Some(content) = el.value().attr("content") else {
            continue;
        };
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        match key {
            "og:title" if og.title.is_empty() => og.title = content.to_string(),
            "og:description" if og.description.is_empty() => {
                og.description = content.to_string();
            }
            // og:image may repeat; collect them all in page order.
            "og:image" | "og:image:secure_url" => og.images.push(content.to_string()),
            "og:price:amount" | "product:price:amount" if og.price.is_empty() => {
                og.price = content.to_string();
            }
            _ => {}
        }
    }
    og
}

// ── Regex heuristics ─────────────────────────────────────────────────────────

/// First currency-prefixed numeric run in the raw HTML, digits only.
fn regex_price(html: &str) -> String {
    let re = Regex::new(r"[$€£₹¥]\s*([\d,]+(?:\.\d+)?)").expect("price regex is valid");
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace(',', ""))
        .unwrap_or_default()
}

/// Strike-through or MRP/Was-labelled price, accepted only when it is
/// numerically greater than the selling price.
fn regex_compare_at(html: &str, price: &str) -> String {
    let selling = parse_price_value(price).unwrap_or(0.0);
    if selling <= 0.0 {
        return String::new();
    }

    let patterns = [
        r"(?s)<(?:del|s|strike)(?:\s[^>]*)?>(.{0,120}?)</(?:del|s|strike)>",
        r#"(?:MRP|M\.R\.P\.|Was)[:\s]{0,5}[$€£₹¥]?\s*([\d,]+(?:\.\d+)?)"#,
    ];

    for pattern in patterns {
        let re = Regex::new(pattern).expect("compare-at regex is valid");
        for caps in re.captures_iter(html) {
            let Some(m) = caps.get(1) else { continue };
            if let Some(v) = parse_price_value(m.as_str()) {
                if v > selling {
                    return format!("{v:.2}");
                }
            }
        }
    }
    String::new()
}

// ── <img> scan ───────────────────────────────────────────────────────────────

/// Top up the image list from plain `<img>` tags. Skips obvious chrome
/// (logos, icons, sprites, pixels).
fn scan_img_tags(document: &Html, base_url: &str, images: &mut Vec<String>) {
    let Ok(sel) = Selector::parse("img[src], img[data-src]") else {
        return;
    };

    for el in document.select(&sel) {
        if images.len() >= MAX_IMAGES {
            break;
        }
        let src = el
            .value()
            .attr("src")
            .or_else(|| el.value().attr("data-src"))
            .unwrap_or_default();
        let lower = src.to_lowercase();
        if lower.contains("logo")
            || lower.contains("icon")
            || lower.contains("sprite")
            || lower.contains("pixel")
            || lower.ends_with(".svg")
            || lower.ends_with(".gif")
        {
            continue;
        }
        push_image(images, src, base_url);
    }
}

// ── Title helpers ────────────────────────────────────────────────────────────

fn page_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next().map(|el| element_text(&el)))
        .unwrap_or_default()
}

/// Drop a trailing site-name segment: "Cool Shirt | BigStore" -> "Cool Shirt".
fn strip_title_suffix(title: &str) -> String {
    for sep in [" | ", " – ", " - "] {
        if let Some(idx) = title.find(sep) {
            return title[..idx].trim().to_string();
        }
    }
    title.trim().to_string()
}

fn first_non_empty(candidates: &[String]) -> String {
    candidates
        .iter()
        .find(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://shop.example.com/p/widget";

    #[test]
    fn jsonld_product_wins_over_og_and_title() {
        let html = r#"<html><head>
            <title>Fallback | Site</title>
            <meta property="og:title" content="OG Widget">
            <script type="application/ld+json">
            {"@context":"https://schema.org","@type":"Product",
             "name":"JSON-LD Widget","description":"A fine widget",
             "image":["http://a.com/1.jpg"],
             "brand":{"name":"Acme"},"sku":"W-1",
             "offers":{"price":"19.99","highPrice":"29.99","priceCurrency":"USD"}}
            </script>
            </head><body></body></html>"#;

        let record = GenericExtractor::new().extract(html, BASE);
        assert_eq!(record.product_name, "JSON-LD Widget");
        assert_eq!(record.price, "19.99");
        assert_eq!(record.compare_at_price, "29.99");
        assert_eq!(record.images, vec!["http://a.com/1.jpg"]);
        assert_eq!(record.vendor, "Acme");
        assert_eq!(record.sku, "W-1");
        assert!(GenericExtractor::meets_success_bar(&record));
    }

    #[test]
    fn jsonld_graph_wrapper_is_walked() {
        let html = r#"<script type="application/ld+json">
            {"@graph":[{"@type":"WebSite","name":"Site"},
                       {"@type":"Product","name":"Graph Widget",
                        "image":"http://a.com/g.jpg",
                        "offers":{"price":42}}]}
            </script>"#;
        let record = GenericExtractor::new().extract(html, BASE);
        assert_eq!(record.product_name, "Graph Widget");
        assert_eq!(record.price, "42");
    }

    #[test]
    fn og_fallback_when_no_jsonld() {
        let html = r#"<html><head>
            <meta property="og:title" content="OG Widget">
            <meta property="og:description" content="from og">
            <meta property="og:image" content="https://cdn.example.com/1.jpg">
            <meta property="og:image" content="https://cdn.example.com/2.jpg">
            <meta property="product:price:amount" content="12.50">
            </head><body></body></html>"#;

        let record = GenericExtractor::new().extract(html, BASE);
        assert_eq!(record.product_name, "OG Widget");
        assert_eq!(record.description, "from og");
        assert_eq!(record.price, "12.50");
        assert_eq!(
            record.images,
            vec![
                "https://cdn.example.com/1.jpg",
                "https://cdn.example.com/2.jpg"
            ]
        );
    }

    #[test]
    fn regex_price_and_mrp_from_raw_html() {
        let html = r#"<html><body>
            <span class="now">$49.99</span>
            <span class="was">MRP: $89.99</span>
            </body></html>"#;
        let record = GenericExtractor::new().extract(html, BASE);
        assert_eq!(record.price, "49.99");
        assert_eq!(record.compare_at_price, "89.99");
    }

    #[test]
    fn strike_through_below_price_is_rejected() {
        let html = r#"<body><span>$49.99</span><del>$10.00</del></body>"#;
        let record = GenericExtractor::new().extract(html, BASE);
        assert_eq!(record.price, "49.99");
        // Inflated instead: no genuine higher value found.
        assert_eq!(record.compare_at_price, "59.99");
    }

    #[test]
    fn title_only_page_fails_success_bar() {
        let html = "<html><head><title>Cool Shirt | BigStore</title></head><body></body></html>";
        let record = GenericExtractor::new().extract(html, BASE);
        assert_eq!(record.product_name, "Cool Shirt");
        assert!(record.images.is_empty());
        assert!(!GenericExtractor::meets_success_bar(&record));
    }

    #[test]
    fn img_scan_dedupes_caps_and_filters() {
        let mut body = String::from("<html><body>");
        body.push_str(r#"<img src="/logo.png"><img src="spacer.gif">"#);
        for i in 0..15 {
            body.push_str(&format!(r#"<img src="/img/{i}.jpg">"#));
        }
        body.push_str(r#"<img src="/img/0.jpg">"#);
        body.push_str("</body></html>");

        let record = GenericExtractor::new().extract(&body, BASE);
        assert_eq!(record.images.len(), MAX_IMAGES);
        assert_eq!(record.images[0], "https://shop.example.com/img/0.jpg");
        assert!(record.images.iter().all(|u| u.starts_with("https://")));
    }

    #[test]
    fn weight_is_estimated_from_name() {
        let html = r#"<script type="application/ld+json">
            {"@type":"Product","name":"Trail Laptop Sleeve","image":"http://a.com/1.jpg"}
            </script>"#;
        let record = GenericExtractor::new().extract(html, BASE);
        assert_eq!(record.weight, "2");
    }
}
