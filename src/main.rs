use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tower::ServiceExt;
use tracing_subscriber::EnvFilter;

use doge_savings_scraper::diff::{self, Snapshot};
use doge_savings_scraper::{BrowserKind, ScrapeRequest, ScraperService};

#[derive(Debug, Parser)]
#[command(name = "doge-savings-scraper")]
#[command(about = "Scrape and diff the savings table on doge.gov")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BrowserArg {
    Chrome,
    Chromium,
}

impl From<BrowserArg> for BrowserKind {
    fn from(arg: BrowserArg) -> Self {
        match arg {
            BrowserArg::Chrome => BrowserKind::Chrome,
            BrowserArg::Chromium => BrowserKind::Chromium,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the scraper and write a snapshot CSV.
    Run {
        /// The browser to use.
        #[arg(long, value_enum, default_value = "chrome")]
        browser: BrowserArg,
        /// Run the browser headed and log debugging artifacts.
        #[arg(long)]
        debug: bool,
        /// How often to log while scraping.
        #[arg(long, default_value_t = 10)]
        log_freq: usize,
        /// Only scrape this many results (testing purposes).
        #[arg(long)]
        max_results: Option<usize>,
        /// Where snapshot CSVs are kept.
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
    /// Diff two snapshots. With no paths, the newest snapshot is
    /// compared against an earlier one from the data directory.
    Diff {
        /// Newer snapshot.
        new: Option<PathBuf>,
        /// Older snapshot.
        old: Option<PathBuf>,
        /// Where snapshot CSVs are kept.
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        /// How many scrapes back to compare against.
        #[arg(long, default_value_t = 1)]
        base_index: usize,
    },
    /// Summarize one snapshot.
    Summarize { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match &cli.command {
        Commands::Run { debug: true, .. } => "info,doge_savings_scraper=debug",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Run {
            browser,
            debug,
            log_freq,
            max_results,
            data_dir,
        } => {
            let mut request = ScrapeRequest::new()
                .with_browser(browser.into())
                .with_debug(debug)
                .with_log_freq(log_freq)
                .with_data_dir(data_dir);
            if let Some(max) = max_results {
                request = request.with_max_results(max);
            }

            let result = ScraperService::new().oneshot(request).await?;
            println!("Snapshot written: {}", result.csv_path.display());
        }
        Commands::Diff {
            new,
            old,
            data_dir,
            base_index,
        } => {
            let (new_path, old_path) = match (new, old) {
                (Some(new), Some(old)) => (new, old),
                (None, None) => diff::latest_pair(&data_dir, base_index)?,
                _ => anyhow::bail!("give both snapshot paths, or neither"),
            };

            let new_snapshot = Snapshot::load(new_path)?;
            let old_snapshot = Snapshot::load(old_path)?;
            print!("{}", diff::summarize(&new_snapshot).render());
            print!("{}", diff::summarize(&old_snapshot).render());
            print!("{}", diff::diff(&new_snapshot, &old_snapshot).render());
        }
        Commands::Summarize { path } => {
            let snapshot = Snapshot::load(path)?;
            print!("{}", diff::summarize(&snapshot).render());
        }
    }

    Ok(())
}
