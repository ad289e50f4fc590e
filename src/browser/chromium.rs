//! Chromium-based browser using chromiumoxide.

use super::{Browser, PageSession, ScopedPage};
use crate::error::ExtractError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// User agent presented by browser sessions. Matches the fetch stage so a
/// site sees one consistent client.
const SESSION_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/131.0.0.0 Safari/537.36";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. PRODEX_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("PRODEX_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.prodex/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".prodex/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".prodex/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".prodex/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".prodex/chromium/chrome-linux64/chrome"),
                home.join(".prodex/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-backed [`Browser`].
pub struct ChromiumBrowser {
    browser: CdpBrowser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumBrowser {
    /// Launch a headless Chromium with anti-detection flags.
    pub async fn new() -> Result<Self, ExtractError> {
        let chrome_path = find_chromium().ok_or_else(|| {
            ExtractError::Browser(
                "Chromium not found. Set PRODEX_CHROMIUM_PATH or install Chrome.".into(),
            )
        })?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-blink-features=AutomationControlled")
            .window_size(1366, 768)
            .build()
            .map_err(|e| ExtractError::Browser(format!("browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| ExtractError::Browser(format!("failed to launch Chromium: {e}")))?;

        // Drain CDP events for the life of the browser.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        debug!("chromium launched");
        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn open(&self) -> Result<ScopedPage, ExtractError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ExtractError::Browser(format!("failed to open page: {e}")))?;

        if let Err(e) = page.set_user_agent(SESSION_USER_AGENT).await {
            warn!("failed to set user agent: {e}");
        }

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(ScopedPage::new(Box::new(ChromiumPage {
            page: Some(page),
            active_count: Arc::clone(&self.active_count),
        })))
    }

    async fn shutdown(&self) -> Result<(), ExtractError> {
        // Browser process exits when the CdpBrowser handle is dropped.
        Ok(())
    }

    fn active_pages(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium tab.
pub struct ChromiumPage {
    page: Option<Page>,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl PageSession for ChromiumPage {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<(), ExtractError> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| ExtractError::Browser("page already closed".into()))?;

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            page.goto(url),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                // Best effort: wait for the load event before handing the
                // DOM to selectors.
                let _ = page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(ExtractError::Network(format!("navigation failed: {e}"))),
            Err(_) => Err(ExtractError::timeout(format!("navigation to {url}"), timeout_ms)),
        }
    }

    async fn html(&self) -> Result<String, ExtractError> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| ExtractError::Browser("page already closed".into()))?;

        let result = page
            .evaluate("document.documentElement.outerHTML")
            .await
            .map_err(|e| ExtractError::Browser(format!("failed to get HTML: {e}")))?;

        result
            .into_value::<String>()
            .map_err(|e| ExtractError::Malformed(format!("HTML result: {e:?}")))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ExtractError> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| ExtractError::Browser("page already closed".into()))?;

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| ExtractError::Browser(format!("JS evaluation failed: {e}")))?;

        result
            .into_value()
            .map_err(|e| ExtractError::Malformed(format!("JS result: {e:?}")))
    }

    async fn close(&mut self) -> Result<(), ExtractError> {
        if let Some(page) = self.page.take() {
            self.active_count.fetch_sub(1, Ordering::Relaxed);
            let _ = page.close().await;
        }
        Ok(())
    }

    fn close_in_background(&mut self) {
        if let Some(page) = self.page.take() {
            self.active_count.fetch_sub(1, Ordering::Relaxed);
            tokio::spawn(async move {
                let _ = page.close().await;
            });
        }
    }
}
