//! The extraction pipeline: platform dispatch, timeout-bounded specialized
//! extraction, generic structured-data parsing, AI escalation, and the
//! manual-HTML protocol, in one `extract` call.
//!
//! Strategy order within a call is strictly sequential. Each stage after the
//! first reuses the body fetched in stage one, and every stage is expensive
//! (browser spin-up, paid AI calls), so nothing runs speculatively in
//! parallel. Concurrency happens across calls, which share only the
//! immutable platform table.

use crate::browser::Browser;
use crate::error::ExtractError;
use crate::extract::ai::{AiExtractor, CompletionService};
use crate::extract::generic::GenericExtractor;
use crate::extract::platforms::PlatformTable;
use crate::fetch::{blocked_reason, HttpFetcher, FETCH_TIMEOUT_MS};
use crate::record::ExtractionOutcome;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Race `fut` against a deadline, converting a stall into a typed failure.
///
/// The guard only stops the caller from waiting: the losing future is
/// dropped, and resource release on that path belongs to the operation
/// itself (see `browser::ScopedPage`).
pub async fn with_timeout<T>(
    fut: impl Future<Output = Result<T, ExtractError>>,
    budget_ms: u64,
    what: &str,
) -> Result<T, ExtractError> {
    match tokio::time::timeout(Duration::from_millis(budget_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(ExtractError::timeout(what, budget_ms)),
    }
}

/// Drives the end-to-end decision flow for one product URL.
pub struct Orchestrator {
    fetcher: HttpFetcher,
    platforms: PlatformTable,
    generic: GenericExtractor,
    ai: AiExtractor,
    browser: Arc<dyn Browser>,
}

impl Orchestrator {
    /// Standard pipeline: default fetcher and platform table.
    pub fn new(browser: Arc<dyn Browser>, completion: Arc<dyn CompletionService>) -> Self {
        Self::with_parts(
            HttpFetcher::new(FETCH_TIMEOUT_MS),
            PlatformTable::with_defaults(),
            AiExtractor::new(completion),
            browser,
        )
    }

    /// Replace the page-fetch budget, e.g. from a CLI `--timeout` override.
    pub fn with_fetch_timeout(mut self, timeout_ms: u64) -> Self {
        self.fetcher = HttpFetcher::new(timeout_ms);
        self
    }

    /// Full dependency injection, used by tests to substitute stubs.
    pub fn with_parts(
        fetcher: HttpFetcher,
        platforms: PlatformTable,
        ai: AiExtractor,
        browser: Arc<dyn Browser>,
    ) -> Self {
        Self {
            fetcher,
            platforms,
            generic: GenericExtractor::new(),
            ai,
            browser,
        }
    }

    /// Extract one product record.
    ///
    /// Terminal outcomes only: `Success`, `ManualHtmlRequired` (caller
    /// re-invokes with pasted source), or `Failure`. No strategy error
    /// escapes this boundary.
    pub async fn extract(&self, url: &str, manual_html: Option<&str>) -> ExtractionOutcome {
        // Manual path: pattern parsing is too fragile for arbitrary pasted
        // markup, so go straight to AI.
        if let Some(html) = manual_html.filter(|h| !h.trim().is_empty()) {
            info!(url, "manual HTML supplied, dispatching to AI");
            return self.ai_outcome(html, url).await;
        }

        // AUTO_FETCH
        let page = match self.fetcher.get(url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url, error = %e, "auto-fetch failed, escalating to manual HTML");
                return manual_html_required(&e.to_string());
            }
        };
        if let Some(reason) = blocked_reason(&page.body) {
            let blocked = ExtractError::Blocked(reason);
            info!(url, error = %blocked, "page looks blocked, escalating to manual HTML");
            return manual_html_required(&blocked.to_string());
        }

        // DETECT_PLATFORM
        if let Some(rule) = self.platforms.match_url(url) {
            let platform = rule.extractor.name();
            info!(url, platform, budget_ms = rule.timeout_ms, "running specialized extractor");

            let attempt = with_timeout(
                rule.extractor.extract("", url, self.browser.as_ref()),
                rule.timeout_ms,
                platform,
            )
            .await;

            match attempt {
                // Partial success (say, images but a broken title selector)
                // is still worth keeping over a fresh AI attempt.
                Ok(record) if record.has_meaningful_data() => {
                    return ExtractionOutcome::success(record);
                }
                Ok(_) => warn!(url, platform, "specialized extractor found nothing"),
                Err(e) => warn!(url, platform, error = %e, "specialized extractor failed"),
            }

            // Fall back to AI on the body already fetched; never re-fetch.
            return self.ai_outcome(&page.body, url).await;
        }

        // NO_MATCH: generic structured-data parse, with its stricter bar.
        let record = self.generic.extract(&page.body, url);
        if GenericExtractor::meets_success_bar(&record) {
            info!(url, "generic extraction succeeded");
            return ExtractionOutcome::success(record);
        }
        info!(url, "generic extraction below success bar, dispatching to AI");
        self.ai_outcome(&page.body, url).await
    }

    /// AI_PARSE: the one stage with no further fallback.
    async fn ai_outcome(&self, html: &str, url: &str) -> ExtractionOutcome {
        match self.ai.extract(html, url).await {
            Ok(record) if record.has_meaningful_data() => ExtractionOutcome::success(record),
            Ok(_) => ExtractionOutcome::Failure {
                reason: ExtractError::NoData.to_string(),
            },
            Err(e) => {
                warn!(url, error = %e, "AI extraction failed");
                ExtractionOutcome::Failure {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Terminal escalation outcome with copy-paste instructions for the caller's
/// UI to render verbatim.
fn manual_html_required(reason: &str) -> ExtractionOutcome {
    ExtractionOutcome::ManualHtmlRequired {
        message: format!(
            "Automated access to this page was blocked ({reason}). \
             Paste the page source to continue."
        ),
        instructions: vec![
            "Open the product page in your browser.".into(),
            "View the page source: Ctrl+U (Windows/Linux) or Cmd+Option+U (Mac).".into(),
            "Select all: Ctrl+A / Cmd+A, then copy: Ctrl+C / Cmd+C.".into(),
            "Paste the copied HTML and run the extraction again.".into(),
        ],
    }
}
