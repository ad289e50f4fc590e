//! Failure taxonomy for the extraction pipeline.
//!
//! Strategy code returns `Result<_, ExtractError>`; the orchestrator is the
//! only layer that maps these into terminal [`ExtractionOutcome`] tags.
//! `Blocked` is an escalation signal rather than a hard failure.
//!
//! [`ExtractionOutcome`]: crate::record::ExtractionOutcome

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Fetch or navigation could not complete (DNS, TLS, connect, non-2xx).
    #[error("network failure: {0}")]
    Network(String),

    /// An operation exceeded its timeout budget.
    #[error("{what} timed out after {budget_ms}ms")]
    Timeout { what: String, budget_ms: u64 },

    /// Bot-check or CAPTCHA detected; automated access is off the table.
    #[error("automated access blocked: {0}")]
    Blocked(String),

    /// AI or JSON-LD output could not be parsed.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Browser launch or page-session failure.
    #[error("browser error: {0}")]
    Browser(String),

    /// Every strategy ran but nothing usable came out.
    #[error("no usable product data found")]
    NoData,
}

impl ExtractError {
    pub fn timeout(what: impl Into<String>, budget_ms: u64) -> Self {
        ExtractError::Timeout {
            what: what.into(),
            budget_ms,
        }
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExtractError::Timeout {
                what: "http request".into(),
                budget_ms: 0,
            }
        } else {
            ExtractError::Network(e.to_string())
        }
    }
}
