use crate::error::SiteError;
use crate::scrapers::extract;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::{Document, ElementLocator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Launch settings for the Chrome session
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub chromium_path: PathBuf,
    /// Default timeout for navigation and CDP calls
    pub page_timeout: Duration,
    /// How long Chrome may sit idle before the session is torn down.
    /// Must outlast the longest rate-limit backoff.
    pub idle_timeout: Duration,
}

/// Page fetcher backed by headless Chrome
///
/// Owns the browser process; dropping the fetcher closes it.
pub struct ChromeFetcher {
    // held for the lifetime of the tab
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeFetcher {
    /// Launch Chrome and open the working tab
    pub fn launch(options: &BrowserOptions) -> Result<Self> {
        info!(
            "Launching Chrome from {} (headless: {})...",
            options.chromium_path.display(),
            options.headless
        );

        let launch_options = LaunchOptions::default_builder()
            .headless(options.headless)
            .sandbox(false)
            .enable_gpu(false)
            .ignore_certificate_errors(true)
            .window_size(Some((1920, 1080)))
            .path(Some(options.chromium_path.clone()))
            .idle_browser_timeout(options.idle_timeout)
            .args(vec![
                OsStr::new("--disable-setuid-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
            ])
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(launch_options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(options.page_timeout);

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Run a blocking CDP operation off the async runtime
    async fn with_tab<T, F>(&self, op: F) -> Result<T, SiteError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, SiteError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || op(&tab))
            .await
            .map_err(|e| SiteError::Browser(format!("browser task failed: {}", e)))?
    }
}

/// Map a CDP failure onto the site error signals
fn classify(err: anyhow::Error, action: &str) -> SiteError {
    let message = format!("{}: {:#}", action, err);

    if message.contains("ERR_INTERNET_DISCONNECTED") {
        SiteError::Disconnected(message)
    } else if message.contains("never came") || message.to_lowercase().contains("timeout") {
        SiteError::Timeout(message)
    } else {
        SiteError::Browser(message)
    }
}

/// Capture the current page, raising marketplace error pages
fn snapshot(tab: &Tab) -> Result<Document, SiteError> {
    let url = tab.get_url();
    let html = tab
        .get_content()
        .map_err(|e| classify(e, "reading page content"))?;

    let frame_html = if extract::has_forbidden_frame(&html) {
        Some(forbidden_frame_html(tab)?)
    } else {
        None
    };
    extract::check_page(&html, frame_html.as_deref())?;

    Ok(Document::new(url, html))
}

fn forbidden_frame_html(tab: &Tab) -> Result<String, SiteError> {
    let script = format!(
        r#"(() => {{
            const frame = document.querySelector('iframe[src="{}"]');
            return frame && frame.contentDocument
                ? frame.contentDocument.documentElement.outerHTML
                : '';
        }})()"#,
        extract::FORBIDDEN_URL
    );

    let result = tab
        .evaluate(&script, false)
        .map_err(|e| classify(e, "reading forbidden frame"))?;

    Ok(result
        .value
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default())
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn load(&self, url: &str) -> Result<Document, SiteError> {
        debug!("Loading {}", url);
        let url = url.to_string();

        self.with_tab(move |tab| {
            tab.navigate_to(&url)
                .map_err(|e| classify(e, &format!("navigating to {}", url)))?;
            tab.wait_until_navigated()
                .map_err(|e| classify(e, &format!("waiting for {}", url)))?;
            snapshot(tab)
        })
        .await
    }

    async fn execute_script(&self, expression: &str) -> Result<Value, SiteError> {
        let expression = expression.to_string();

        self.with_tab(move |tab| {
            let wrapped = format!("JSON.stringify({})", expression);
            let result = tab
                .evaluate(&wrapped, false)
                .map_err(|e| classify(e, &format!("evaluating {}", expression)))?;

            let raw = result
                .value
                .and_then(|value| value.as_str().map(str::to_string))
                .ok_or_else(|| {
                    SiteError::payload("script", format!("{} evaluated to nothing", expression))
                })?;

            serde_json::from_str(&raw).map_err(|e| SiteError::payload("script", e))
        })
        .await
    }

    async fn current_wait(
        &self,
        locator: &ElementLocator,
        timeout: Duration,
    ) -> Result<Document, SiteError> {
        let css = locator.to_css();

        self.with_tab(move |tab| {
            tab.wait_for_element_with_custom_timeout(&css, timeout)
                .map_err(|e| SiteError::Timeout(format!("{} ({:#})", css, e)))?;
            snapshot(tab)
        })
        .await
    }
}
