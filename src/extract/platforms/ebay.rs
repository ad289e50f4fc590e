//! eBay item-page extractor. Same shape as the Amazon strategy with a
//! lighter selector set; eBay pages mostly arrive server-rendered.

use crate::browser::Browser;
use crate::error::ExtractError;
use crate::extract::platforms::clean_price;
use crate::extract::{first_attr, first_text, push_image, PlatformExtractor};
use crate::normalize;
use crate::record::ProductRecord;
use async_trait::async_trait;
use scraper::{Html, Selector};

const NAV_TIMEOUT_MS: u64 = 20_000;

pub struct EbayExtractor;

impl EbayExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parse(&self, html: &str, url: &str) -> ProductRecord {
        let document = Html::parse_document(html);
        let mut record = ProductRecord::default();

        record.product_name = first_non_empty_text(
            &document,
            &["h1.x-item-title__mainTitle", ".x-item-title__mainTitle span"],
        );

        for sel in [".x-price-primary .ux-textspans", r#"[itemprop="price"]"#] {
            let text = first_text(&document, sel);
            let price = clean_price(&text);
            if !price.is_empty() {
                record.price = price;
                break;
            }
        }

        let strike = first_text(&document, ".ux-textspans--STRIKETHROUGH");
        let strike = clean_price(&strike);
        if !strike.is_empty() && strike != record.price {
            record.compare_at_price = strike;
        }

        record.description =
            first_attr(&document, r#"meta[name="description"]"#, "content");
        record.vendor = first_text(&document, ".x-sellercard-atf__info__about-seller a");
        record.sku = first_text(&document, ".ux-layout-section__item--itemId .ux-textspans--BOLD");
        collect_images(&document, url, &mut record.images);

        normalize::normalize_record(record)
    }
}

impl Default for EbayExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformExtractor for EbayExtractor {
    fn name(&self) -> &'static str {
        "ebay"
    }

    async fn extract(
        &self,
        html: &str,
        url: &str,
        browser: &dyn Browser,
    ) -> Result<ProductRecord, ExtractError> {
        let rendered;
        let html = if html.trim().is_empty() {
            let mut page = browser.open().await?;
            page.navigate(url, NAV_TIMEOUT_MS).await?;
            rendered = page.html().await?;
            page.close().await?;
            rendered.as_str()
        } else {
            html
        };

        Ok(self.parse(html, url))
    }
}

fn first_non_empty_text(document: &Html, selectors: &[&str]) -> String {
    for sel in selectors {
        let text = first_text(document, sel);
        if !text.is_empty() {
            return text;
        }
    }
    String::new()
}

fn collect_images(document: &Html, url: &str, images: &mut Vec<String>) {
    let Ok(sel) = Selector::parse(".ux-image-carousel-item img, .ux-image-grid-item img")
    else {
        return;
    };
    for el in document.select(&sel) {
        let src = el
            .value()
            .attr("data-zoom-src")
            .or_else(|| el.value().attr("src"))
            .or_else(|| el.value().attr("data-src"))
            .unwrap_or_default();
        push_image(images, src, url);
    }
}
