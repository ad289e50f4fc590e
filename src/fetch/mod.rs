//! Plain-HTTP page fetch with browser-like headers.
//!
//! Not a browser, just HTTP requests. First stage of every automated
//! extraction: cheap, and its body is reused by every later strategy so no
//! page is fetched twice. Also home of the blocked-page heuristics that
//! trigger manual-HTML escalation.

use crate::error::ExtractError;
use crate::record::FetchedPage;
use std::time::Duration;

/// Default budget for the initial page fetch.
pub const FETCH_TIMEOUT_MS: u64 = 20_000;

/// Bodies below this size are assumed to be interstitials or bot checks, not
/// product pages. Approximate by design; a tunable, not an invariant.
pub const MIN_PLAUSIBLE_HTML_BYTES: usize = 10 * 1024;

/// Lowercase substrings that mark a bot-check / CAPTCHA interstitial.
const BOT_CHECK_MARKERS: &[&str] = &[
    "type the characters you see",
    "enter the characters you see",
    "robot check",
    "are you a robot",
    "captcha",
    "verify you are a human",
    "unusual traffic from your computer",
    "access denied",
    "pardon our interruption",
];

/// HTTP client for the auto-fetch stage.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a standard Chrome user-agent and browser-like
    /// accept headers.
    pub fn new(timeout_ms: u64) -> Self {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                  AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/131.0.0.0 Safari/537.36";

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .default_headers(headers)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// GET a product page. Retries once on 5xx with a short backoff; a final
    /// non-2xx status is a network failure (the orchestrator escalates it to
    /// manual HTML rather than failing the call).
    pub async fn get(&self, url: &str) -> Result<FetchedPage, ExtractError> {
        let mut retried = false;

        loop {
            let resp = self.client.get(url).send().await?;
            let status = resp.status().as_u16();
            let final_url = resp.url().to_string();

            if status >= 500 && !retried {
                retried = true;
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }

            if !(200..300).contains(&status) {
                return Err(ExtractError::Network(format!(
                    "GET {url} returned status {status}"
                )));
            }

            let body = resp
                .text()
                .await
                .map_err(|e| ExtractError::Network(format!("GET {url} body read: {e}")))?;
            return Ok(FetchedPage {
                url: url.to_string(),
                final_url,
                status,
                body,
            });
        }
    }
}

/// Heuristic: does this body look like a bot check instead of a product page?
///
/// Returns the reason when blocked, `None` for a plausible page.
pub fn blocked_reason(html: &str) -> Option<String> {
    if html.len() < MIN_PLAUSIBLE_HTML_BYTES {
        return Some(format!(
            "response too small to be a product page ({} bytes)",
            html.len()
        ));
    }
    let lower = html.to_lowercase();
    for marker in BOT_CHECK_MARKERS {
        if lower.contains(marker) {
            return Some(format!("bot-check marker found: {marker:?}"));
        }
    }
    None
}
