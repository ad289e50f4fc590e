//! Amazon product-page extractor.
//!
//! Browser-driven when no HTML is supplied (Amazon assembles the price block
//! and image gallery client-side on many locales); parses a supplied blob
//! directly on the manual-paste path. Field misses degrade to empty strings,
//! the page-layout selectors are the only Amazon-specific knowledge here.

use crate::browser::Browser;
use crate::error::ExtractError;
use crate::extract::platforms::clean_price;
use crate::extract::{first_attr, first_inner_html, first_text, push_image, PlatformExtractor};
use crate::normalize;
use crate::record::ProductRecord;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

/// Inner navigation budget; the orchestrator's guard holds the outer one.
const NAV_TIMEOUT_MS: u64 = 45_000;

pub struct AmazonExtractor;

impl AmazonExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous selector pass over a rendered or pasted document.
    fn parse(&self, html: &str, url: &str) -> ProductRecord {
        let document = Html::parse_document(html);
        let mut record = ProductRecord::default();

        record.product_name = first_text(&document, "#productTitle");

        // Selling price: offscreen span inside the buybox price first, then
        // the legacy price block ids.
        for sel in [
            "#corePrice_feature_div .a-price .a-offscreen",
            ".a-price:not(.a-text-price) .a-offscreen",
            "#priceblock_ourprice",
            "#priceblock_dealprice",
        ] {
            let text = first_text(&document, sel);
            let price = clean_price(&text);
            if !price.is_empty() {
                record.price = price;
                break;
            }
        }

        // Strike-through / list price.
        for sel in [
            ".basisPrice .a-price .a-offscreen",
            ".a-text-price .a-offscreen",
            "#priceblock_strikeprice",
        ] {
            let text = first_text(&document, sel);
            let price = clean_price(&text);
            if !price.is_empty() && price != record.price {
                record.compare_at_price = price;
                break;
            }
        }

        record.description = first_non_empty_html(&document);
        record.vendor = byline_brand(&document);
        record.sku = asin_from_url(url);
        collect_images(&document, html, url, &mut record.images);

        normalize::normalize_record(record)
    }
}

impl Default for AmazonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformExtractor for AmazonExtractor {
    fn name(&self) -> &'static str {
        "amazon"
    }

    async fn extract(
        &self,
        html: &str,
        url: &str,
        browser: &dyn Browser,
    ) -> Result<ProductRecord, ExtractError> {
        let rendered;
        let html = if html.trim().is_empty() {
            // Session-level failures propagate; the ScopedPage drop guard
            // releases the tab if navigation errors or the caller's timeout
            // cancels this future.
            let mut page = browser.open().await?;
            page.navigate(url, NAV_TIMEOUT_MS).await?;
            rendered = page.html().await?;
            page.close().await?;
            rendered.as_str()
        } else {
            html
        };

        debug!(bytes = html.len(), "parsing amazon page");
        Ok(self.parse(html, url))
    }
}

/// Feature bullets, falling back to the long description block.
fn first_non_empty_html(document: &Html) -> String {
    for sel in ["#feature-bullets ul", "#productDescription"] {
        let html = first_inner_html(document, sel);
        if !html.is_empty() {
            return html;
        }
    }
    String::new()
}

/// Brand from the byline, shorn of Amazon's link phrasing.
fn byline_brand(document: &Html) -> String {
    let text = first_text(document, "#bylineInfo");
    text.trim_start_matches("Visit the ")
        .trim_start_matches("Brand: ")
        .trim_end_matches(" Store")
        .trim()
        .to_string()
}

/// ASIN from a `/dp/` or `/gp/product/` URL segment.
fn asin_from_url(url: &str) -> String {
    Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]{10})")
        .expect("asin regex is valid")
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Gallery images: the dynamic-image JSON attribute, hiRes entries in the
/// embedded image-block state, then the landing image itself.
fn collect_images(document: &Html, html: &str, url: &str, images: &mut Vec<String>) {
    let dynamic = first_attr(document, "#landingImage", "data-a-dynamic-image");
    if let Ok(map) = serde_json::from_str::<serde_json::Value>(&dynamic) {
        if let Some(obj) = map.as_object() {
            for key in obj.keys() {
                push_image(images, key, url);
            }
        }
    }

    let hires = Regex::new(r#""hiRes"\s*:\s*"(https://[^"]+)""#).expect("hires regex is valid");
    for caps in hires.captures_iter(html) {
        if let Some(m) = caps.get(1) {
            push_image(images, m.as_str(), url);
        }
    }

    if let Ok(sel) = Selector::parse("#landingImage") {
        if let Some(el) = document.select(&sel).next() {
            if let Some(src) = el.value().attr("src") {
                push_image(images, src, url);
            }
        }
    }
}
