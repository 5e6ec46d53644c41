//! Scraper and snapshot differ for the doge.gov savings page.
//!
//! - Walks the savings table and opens each contract's detail popup
//! - Resolves every PIID to its USAspending award page
//! - Writes timestamped CSV snapshots and diffs them run over run
//!
//! # Scrape example
//!
//! ```rust,ignore
//! use doge_savings_scraper::{ScrapeRequest, ScraperService};
//! use tower::ServiceExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let request = ScrapeRequest::new()
//!         .with_max_results(5)
//!         .with_data_dir("./data");
//!
//!     let result = ScraperService::new().oneshot(request).await.unwrap();
//!     println!("Snapshot written: {:?}", result.csv_path);
//! }
//! ```
//!
//! # Diff example
//!
//! ```rust,ignore
//! use doge_savings_scraper::diff::{diff, Snapshot};
//!
//! fn main() {
//!     let new = Snapshot::load("data/doge_savings_cfpb_2025-07-01__10-00-00.csv").unwrap();
//!     let old = Snapshot::load("data/doge_savings_cfpb_2025-06-01__10-00-00.csv").unwrap();
//!     print!("{}", diff(&new, &old).render());
//! }
//! ```

pub mod browser;
pub mod config;
pub mod diff;
pub mod error;
pub mod popup;
pub mod records;
pub mod scrape;
pub mod service;
pub mod traits;
pub mod usaspending;

// Re-export the main types.
pub use browser::CdpBrowser;
pub use config::{BrowserKind, ScrapeConfig};
pub use error::ScrapeError;
pub use records::ContractRecord;
pub use scrape::SavingsScraper;
pub use service::{ScrapeRequest, ScrapeResult, ScraperService};
pub use traits::{AwardLookup, BrowserPage};
pub use usaspending::UsaSpendingClient;
