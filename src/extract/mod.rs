//! Extraction strategies.
//!
//! Three families share one output contract: specialized per-platform
//! extractors (`platforms/`), the structured-data generic extractor
//! (`generic`), and the AI-assisted extractor (`ai`). Shared DOM helpers
//! live here. All scraper-based parsing is synchronous; scraper's types are
//! `!Send`, so async callers parse before the first `.await` or inside
//! `spawn_blocking`.

pub mod ai;
pub mod generic;
pub mod platforms;

use crate::browser::Browser;
use crate::error::ExtractError;
use crate::record::ProductRecord;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A platform-specific extraction strategy.
///
/// Contract: given non-empty `html` (manual paste or an already-fetched
/// body), parse that blob directly; given empty `html`, drive a browser
/// session to render the page first. A missing field degrades to the empty
/// string; only session-level failures (launch, navigation) return `Err`,
/// which the orchestrator treats as a request to fall back.
#[async_trait]
pub trait PlatformExtractor: Send + Sync {
    /// Stable platform name, used in rule tables and logs.
    fn name(&self) -> &'static str;

    /// Extract a product record for `url`.
    async fn extract(
        &self,
        html: &str,
        url: &str,
        browser: &dyn Browser,
    ) -> Result<ProductRecord, ExtractError>;
}

// ── Shared DOM helpers ───────────────────────────────────────────────────────

/// Visible text of an element, whitespace-collapsed.
pub(crate) fn element_text(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first element matching `selector`, or `""`.
pub(crate) fn first_text(document: &Html, selector: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|el| element_text(&el))
        })
        .unwrap_or_default()
}

/// Attribute of the first element matching `selector`, or `""`.
pub(crate) fn first_attr(document: &Html, selector: &str, attr: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr(attr))
                .map(|s| s.to_string())
        })
        .unwrap_or_default()
}

/// Inner HTML of the first element matching `selector`, or `""`.
pub(crate) fn first_inner_html(document: &Html, selector: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| document.select(&sel).next().map(|el| el.inner_html()))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Resolve an image candidate to an absolute http(s) URL.
///
/// Relative paths and protocol-relative `//` URLs are resolved against
/// `base_url`; data URIs and non-http schemes are rejected.
pub(crate) fn resolve_image_url(candidate: &str, base_url: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() || candidate.starts_with("data:") {
        return None;
    }

    let resolved = if candidate.starts_with("http://") || candidate.starts_with("https://") {
        Url::parse(candidate).ok()?
    } else {
        Url::parse(base_url).ok()?.join(candidate).ok()?
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Append an image URL, absolutized and deduplicated, preserving order.
pub(crate) fn push_image(images: &mut Vec<String>, candidate: &str, base_url: &str) {
    if let Some(url) = resolve_image_url(candidate, base_url) {
        if !images.contains(&url) {
            images.push(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_image_url_handles_relative_and_schemes() {
        let base = "https://shop.example.com/p/widget";
        assert_eq!(
            resolve_image_url("/img/1.jpg", base).as_deref(),
            Some("https://shop.example.com/img/1.jpg")
        );
        assert_eq!(
            resolve_image_url("//cdn.example.com/2.jpg", base).as_deref(),
            Some("https://cdn.example.com/2.jpg")
        );
        assert_eq!(
            resolve_image_url("http://a.com/x.png", base).as_deref(),
            Some("http://a.com/x.png")
        );
        assert!(resolve_image_url("data:image/png;base64,AAAA", base).is_none());
        assert!(resolve_image_url("", base).is_none());
    }

    #[test]
    fn push_image_dedupes_preserving_order() {
        let mut images = Vec::new();
        let base = "https://shop.example.com/";
        push_image(&mut images, "/1.jpg", base);
        push_image(&mut images, "/2.jpg", base);
        push_image(&mut images, "https://shop.example.com/1.jpg", base);
        assert_eq!(
            images,
            vec![
                "https://shop.example.com/1.jpg",
                "https://shop.example.com/2.jpg"
            ]
        );
    }

    #[test]
    fn first_text_collapses_whitespace() {
        let doc = Html::parse_document("<div id=t>  Cool \n  Widget </div>");
        assert_eq!(first_text(&doc, "#t"), "Cool Widget");
        assert_eq!(first_text(&doc, "#missing"), "");
    }
}
