use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::Local;
use tower::Service;
use tracing::info;

use crate::browser::CdpBrowser;
use crate::config::{BrowserKind, ScrapeConfig};
use crate::error::ScrapeError;
use crate::records::{snapshot_filename, write_snapshot, ContractRecord};
use crate::scrape::SavingsScraper;
use crate::usaspending::UsaSpendingClient;

/// One full scrape run, as a request.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub browser: BrowserKind,
    pub debug: bool,
    pub log_freq: usize,
    pub max_results: Option<usize>,
    /// Where the snapshot CSV lands.
    pub data_dir: PathBuf,
}

impl Default for ScrapeRequest {
    fn default() -> Self {
        Self {
            browser: BrowserKind::default(),
            debug: false,
            log_freq: 10,
            max_results: None,
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl ScrapeRequest {
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

    pub fn with_log_freq(mut self, log_freq: usize) -> Self {
        self.log_freq = log_freq;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }
}

impl From<&ScrapeRequest> for ScrapeConfig {
    fn from(req: &ScrapeRequest) -> Self {
        ScrapeConfig {
            browser: req.browser,
            debug: req.debug,
            log_freq: req.log_freq,
            max_results: req.max_results,
            ..ScrapeConfig::default()
        }
    }
}

/// Where the snapshot went plus the records it holds.
#[derive(Debug)]
pub struct ScrapeResult {
    pub csv_path: PathBuf,
    pub records: Vec<ContractRecord>,
}

/// tower::Service front over the scraper.
#[derive(Debug, Clone, Default)]
pub struct ScraperService {
    // Room for rate limits or caching later on.
}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeResult;
    type Error = ScrapeError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!("Scrape request received: data_dir={:?}", req.data_dir);

        Box::pin(async move {
            let config: ScrapeConfig = (&req).into();

            std::fs::create_dir_all(&req.data_dir)?;

            let page = CdpBrowser::launch(&config).await?;
            let lookup = UsaSpendingClient::new()?;
            let mut scraper = SavingsScraper::new(config, page, lookup);

            // The browser comes down whichever way the scrape went.
            let outcome = scraper.scrape().await;
            let close_outcome = scraper.close().await;
            let records = outcome?;
            close_outcome?;

            let csv_path = req.data_dir.join(snapshot_filename(Local::now()));
            write_snapshot(&csv_path, &records)?;

            info!(
                "Scrape complete: {} records -> {:?}",
                records.len(),
                csv_path
            );

            Ok(ScrapeResult { csv_path, records })
        })
    }
}
