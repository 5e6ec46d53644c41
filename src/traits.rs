use async_trait::async_trait;
use std::time::Duration;

use crate::error::ScrapeError;

/// Driving interface for a rendered page.
///
/// The production implementation talks to a real Chrome instance over
/// CDP; tests substitute a scripted fake.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the load to finish.
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError>;

    /// Current DOM serialized to HTML.
    async fn content(&self) -> Result<String, ScrapeError>;

    /// Text of every `<button>` on the page, in document order.
    async fn button_labels(&self) -> Result<Vec<String>, ScrapeError>;

    /// Click the nth `<button>` on the page.
    async fn click_button(&self, index: usize) -> Result<(), ScrapeError>;

    /// Scroll the nth `table tr` to the middle of the viewport.
    async fn scroll_row_into_view(&self, row: usize) -> Result<(), ScrapeError>;

    /// Click the nth `table tr` with a real pointer event.
    async fn click_table_row(&self, row: usize) -> Result<(), ScrapeError>;

    /// Poll until `selector` matches. Ok(false) on timeout.
    async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, ScrapeError>;

    /// Click the first match for `selector`.
    async fn click_element(&self, selector: &str) -> Result<(), ScrapeError>;

    /// Full-page PNG capture.
    async fn screenshot_png(&self) -> Result<Vec<u8>, ScrapeError>;

    /// Shut the browser down.
    async fn close(&mut self) -> Result<(), ScrapeError>;
}

/// Maps a contract PIID to USAspending's internal award id.
#[async_trait]
pub trait AwardLookup: Send + Sync {
    async fn internal_id(&self, piid: &str) -> Result<String, ScrapeError>;
}
