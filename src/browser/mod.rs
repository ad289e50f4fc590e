//! Headless-browser abstraction for specialized extractors.
//!
//! Defines the [`Browser`] and [`PageSession`] traits that abstract over the
//! browser engine (currently Chromium via chromiumoxide), plus [`ScopedPage`],
//! the owning wrapper that guarantees tab close on every exit path.
//!
//! Cancellation safety: a timed-out extraction has its future dropped, so the
//! session cannot close itself in normal control flow. `ScopedPage`'s drop
//! hook schedules the close in the background instead, which is what keeps
//! Chromium tabs from accumulating under concurrent load.

pub mod chromium;

use crate::error::ExtractError;
use async_trait::async_trait;
use std::ops::{Deref, DerefMut};

/// A browser engine that can open page sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a new configured page (tab).
    async fn open(&self) -> Result<ScopedPage, ExtractError>;
    /// Shut down the engine.
    async fn shutdown(&self) -> Result<(), ExtractError>;
    /// Number of currently live pages.
    fn active_pages(&self) -> usize;
}

/// One live browser tab.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate and wait for the page to load, bounded by `timeout_ms`.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<(), ExtractError>;
    /// Full rendered document HTML.
    async fn html(&self) -> Result<String, ExtractError>;
    /// Evaluate JavaScript in the page, returning its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ExtractError>;
    /// Close the tab and release its resources.
    async fn close(&mut self) -> Result<(), ExtractError>;
    /// Schedule a background close. Must be safe to call after `close`.
    fn close_in_background(&mut self);
}

/// Owning page handle with guaranteed release.
///
/// Prefer the explicit [`ScopedPage::close`] on the normal path; the drop
/// hook covers error returns and futures cancelled by a timeout guard.
pub struct ScopedPage {
    session: Box<dyn PageSession>,
    closed: bool,
}

impl ScopedPage {
    pub fn new(session: Box<dyn PageSession>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    /// Close the tab now and consume the handle.
    pub async fn close(mut self) -> Result<(), ExtractError> {
        self.closed = true;
        self.session.close().await
    }
}

impl Deref for ScopedPage {
    type Target = dyn PageSession;
    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for ScopedPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for ScopedPage {
    fn drop(&mut self) {
        if !self.closed {
            self.session.close_in_background();
        }
    }
}

/// A no-op browser used when Chromium is unavailable.
///
/// HTTP-based strategies (generic, AI, manual paste) keep working; only
/// browser-driven specialized extraction returns errors, which the
/// orchestrator treats as a fallback trigger.
pub struct NoopBrowser;

#[async_trait]
impl Browser for NoopBrowser {
    async fn open(&self) -> Result<ScopedPage, ExtractError> {
        Err(ExtractError::Browser(
            "browser not available, HTTP-only mode".into(),
        ))
    }
    async fn shutdown(&self) -> Result<(), ExtractError> {
        Ok(())
    }
    fn active_pages(&self) -> usize {
        0
    }
}
