use std::time::Duration;

/// Agency rows are filtered against this name.
pub const TARGET_AGENCY: &str = "CONSUMER FINANCIAL PROTECTION BUREAU";

/// Which browser binary to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserKind {
    /// Locate an installed Chrome automatically.
    #[default]
    Chrome,
    /// Use the `chromium` executable on PATH.
    Chromium,
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub browser: BrowserKind,
    /// Headed browser plus screenshot artifacts on row failures.
    pub debug: bool,
    /// Only rows for this agency are kept.
    pub agency: String,
    /// Log progress every N rows. 0 disables progress lines.
    pub log_freq: usize,
    /// Stop after this many kept rows.
    pub max_results: Option<usize>,
    /// How long to wait for a row's detail popup to render.
    pub popup_timeout: Duration,
    /// Pause after scrolling a row into view, before clicking it.
    pub scroll_settle: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            browser: BrowserKind::default(),
            debug: false,
            agency: TARGET_AGENCY.to_string(),
            log_freq: 10,
            max_results: None,
            popup_timeout: Duration::from_secs(5),
            scroll_settle: Duration::from_secs(1),
        }
    }
}

impl ScrapeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_browser(mut self, browser: BrowserKind) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = agency.into();
        self
    }

    pub fn with_log_freq(mut self, log_freq: usize) -> Self {
        self.log_freq = log_freq;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_popup_timeout(mut self, timeout: Duration) -> Self {
        self.popup_timeout = timeout;
        self
    }

    pub fn with_scroll_settle(mut self, settle: Duration) -> Self {
        self.scroll_settle = settle;
        self
    }
}
