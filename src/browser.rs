use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{BrowserKind, ScrapeConfig};
use crate::error::ScrapeError;
use crate::traits::BrowserPage;

/// CDP request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 60;
/// Interval between element polls.
const POLL_INTERVAL_MS: u64 = 250;

const SCROLL_TO_CENTER_FN: &str =
    "function() { this.scrollIntoView({behavior: 'smooth', block: 'center'}); }";

fn exists_script(selector: &str) -> String {
    format!("document.querySelector({selector:?}) !== null")
}

/// Real Chrome driven over the DevTools protocol.
pub struct CdpBrowser {
    browser: Option<Browser>,
    page: Page,
}

impl CdpBrowser {
    /// Launch a browser and open a blank page.
    ///
    /// Each launch gets its own user data directory so parallel runs
    /// never fight over a profile lock.
    pub async fn launch(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        info!("Launching browser...");

        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("doge-savings-{unique_id}"));

        let mut builder = BrowserConfig::builder().user_data_dir(&user_data_dir);

        if config.browser == BrowserKind::Chromium {
            builder = builder.chrome_executable("chromium");
        }
        if config.debug {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-gpu");

        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::BrowserInit(e.to_string()))?;

        // Drain CDP events in the background for the browser's lifetime.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::BrowserInit(e.to_string()))?;

        info!("Browser ready");
        Ok(Self {
            browser: Some(browser),
            page,
        })
    }
}

#[async_trait]
impl BrowserPage for CdpBrowser {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ScrapeError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| ScrapeError::Navigation(e.to_string()))?;
        debug!("Navigated to {url}");
        Ok(())
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        let value = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .map_err(|e| ScrapeError::JavaScript(e.to_string()))?;
        value
            .into_value()
            .map_err(|e| ScrapeError::JavaScript(e.to_string()))
    }

    async fn button_labels(&self) -> Result<Vec<String>, ScrapeError> {
        let value = self
            .page
            .evaluate(
                "JSON.stringify(Array.from(document.querySelectorAll('button'))\
                 .map(b => b.textContent.trim()))",
            )
            .await
            .map_err(|e| ScrapeError::JavaScript(e.to_string()))?;
        let json: String = value
            .into_value()
            .map_err(|e| ScrapeError::JavaScript(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| ScrapeError::JavaScript(e.to_string()))
    }

    async fn click_button(&self, index: usize) -> Result<(), ScrapeError> {
        let buttons = self
            .page
            .find_elements("button")
            .await
            .map_err(|e| ScrapeError::ElementNotFound(format!("buttons: {e}")))?;
        let button = buttons
            .get(index)
            .ok_or_else(|| ScrapeError::ElementNotFound(format!("button #{index}")))?;
        button
            .click()
            .await
            .map_err(|e| ScrapeError::Navigation(format!("button #{index} click: {e}")))?;
        Ok(())
    }

    async fn scroll_row_into_view(&self, row: usize) -> Result<(), ScrapeError> {
        let rows = self
            .page
            .find_elements("table tr")
            .await
            .map_err(|e| ScrapeError::ElementNotFound(format!("table rows: {e}")))?;
        let element = rows
            .get(row)
            .ok_or_else(|| ScrapeError::ElementNotFound(format!("table row #{row}")))?;
        element
            .call_js_fn(SCROLL_TO_CENTER_FN, false)
            .await
            .map_err(|e| ScrapeError::JavaScript(e.to_string()))?;
        Ok(())
    }

    async fn click_table_row(&self, row: usize) -> Result<(), ScrapeError> {
        let rows = self
            .page
            .find_elements("table tr")
            .await
            .map_err(|e| ScrapeError::ElementNotFound(format!("table rows: {e}")))?;
        let element = rows
            .get(row)
            .ok_or_else(|| ScrapeError::ElementNotFound(format!("table row #{row}")))?;
        element
            .click()
            .await
            .map_err(|e| ScrapeError::Navigation(format!("table row #{row} click: {e}")))?;
        Ok(())
    }

    async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, ScrapeError> {
        let script = exists_script(selector);
        let start = std::time::Instant::now();
        loop {
            let found = self
                .page
                .evaluate(script.as_str())
                .await
                .map_err(|e| ScrapeError::JavaScript(e.to_string()))?
                .into_value::<bool>()
                .unwrap_or(false);
            if found {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn click_element(&self, selector: &str) -> Result<(), ScrapeError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScrapeError::ElementNotFound(format!("{selector}: {e}")))?
            .click()
            .await
            .map_err(|e| ScrapeError::Navigation(format!("{selector} click: {e}")))?;
        Ok(())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, ScrapeError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| ScrapeError::JavaScript(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Browser wait error: {}", e);
            }
            info!("Browser closed");
        }
        Ok(())
    }
}
