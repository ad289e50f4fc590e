//! Platform dispatch: the static, ordered rule table mapping URLs to
//! specialized extractors.
//!
//! Matching is a substring test on the hostname, first rule wins, so table
//! order encodes priority for any URL that could match more than one rule.
//! Each rule carries the platform's timeout budget; platforms that need a
//! full page render get the heavy budget.

pub mod amazon;
pub mod ebay;

use crate::extract::PlatformExtractor;
use std::sync::Arc;
use url::Url;

/// Default budget for a specialized extraction attempt.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Budget for render-heavy platforms.
pub const HEAVY_TIMEOUT_MS: u64 = 60_000;

/// One dispatch rule: hostname substring, timeout budget, strategy.
#[derive(Clone)]
pub struct PlatformRule {
    pub host_pattern: String,
    pub timeout_ms: u64,
    pub extractor: Arc<dyn PlatformExtractor>,
}

impl PlatformRule {
    pub fn new(
        host_pattern: impl Into<String>,
        timeout_ms: u64,
        extractor: Arc<dyn PlatformExtractor>,
    ) -> Self {
        Self {
            host_pattern: host_pattern.into(),
            timeout_ms,
            extractor,
        }
    }
}

/// Immutable, process-wide dispatch table.
#[derive(Clone)]
pub struct PlatformTable {
    rules: Vec<PlatformRule>,
}

impl PlatformTable {
    pub fn new(rules: Vec<PlatformRule>) -> Self {
        Self { rules }
    }

    /// The built-in platform set.
    pub fn with_defaults() -> Self {
        let amazon: Arc<dyn PlatformExtractor> = Arc::new(amazon::AmazonExtractor::new());
        let ebay: Arc<dyn PlatformExtractor> = Arc::new(ebay::EbayExtractor::new());

        Self::new(vec![
            // Amazon renders prices and the image gallery client-side on
            // many locales, so it gets the heavy budget.
            PlatformRule::new("amazon.", HEAVY_TIMEOUT_MS, amazon),
            PlatformRule::new("ebay.", DEFAULT_TIMEOUT_MS, ebay),
        ])
    }

    /// Look up the first rule whose pattern occurs in the URL's hostname.
    pub fn match_url(&self, url: &str) -> Option<&PlatformRule> {
        let host = Url::parse(url).ok()?.host_str()?.to_lowercase();
        self.rules
            .iter()
            .find(|rule| host.contains(&rule.host_pattern))
    }
}

/// Reduce a price fragment like `"$1,299.00"` to `"1299.00"`.
///
/// Extractors store decimal strings without currency symbols; the
/// normalization layer re-attaches a symbol only when inferring a
/// compare-at price from a symbol-carrying input.
pub(crate) fn clean_price(text: &str) -> String {
    regex::Regex::new(r"[\d,]+(?:\.\d+)?")
        .expect("price fragment regex is valid")
        .find(text)
        .map(|m| m.as_str().replace(',', ""))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Browser;
    use crate::error::ExtractError;
    use crate::record::ProductRecord;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl PlatformExtractor for Named {
        fn name(&self) -> &'static str {
            self.0
        }
        async fn extract(
            &self,
            _html: &str,
            _url: &str,
            _browser: &dyn Browser,
        ) -> Result<ProductRecord, ExtractError> {
            Ok(ProductRecord::default())
        }
    }

    #[test]
    fn hostname_substring_match_first_wins() {
        let table = PlatformTable::new(vec![
            PlatformRule::new("shop.example.", 1_000, Arc::new(Named("specific"))),
            PlatformRule::new("example.", 2_000, Arc::new(Named("broad"))),
        ]);

        let rule = table
            .match_url("https://shop.example.com/p/1")
            .expect("should match");
        assert_eq!(rule.extractor.name(), "specific");
        assert_eq!(rule.timeout_ms, 1_000);

        let rule = table
            .match_url("https://www.example.com/p/1")
            .expect("should match");
        assert_eq!(rule.extractor.name(), "broad");
    }

    #[test]
    fn path_substrings_do_not_match() {
        let table = PlatformTable::new(vec![PlatformRule::new(
            "amazon.",
            1_000,
            Arc::new(Named("amazon")),
        )]);
        assert!(table
            .match_url("https://blog.example.com/why-amazon.is-big")
            .is_none());
        assert!(table.match_url("not a url").is_none());
    }

    #[test]
    fn defaults_cover_amazon_locales() {
        let table = PlatformTable::with_defaults();
        for url in [
            "https://www.amazon.com/dp/B000X",
            "https://www.amazon.co.uk/dp/B000X",
            "https://www.amazon.in/dp/B000X",
        ] {
            let rule = table.match_url(url).expect("amazon should match");
            assert_eq!(rule.extractor.name(), "amazon");
            assert_eq!(rule.timeout_ms, HEAVY_TIMEOUT_MS);
        }
        assert!(table.match_url("https://unlisted-store.com/p/1").is_none());
    }

    #[test]
    fn clean_price_strips_symbols_and_separators() {
        assert_eq!(clean_price("$1,299.00"), "1299.00");
        assert_eq!(clean_price("₹2,699"), "2699");
        assert_eq!(clean_price("US $15.49/ea"), "15.49");
        assert_eq!(clean_price("Call us"), "");
    }
}
