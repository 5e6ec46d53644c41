use scraper::Html;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::popup::{element_text, parse_popup, selector, POPUP_CLOSE, POPUP_HEADING};
use crate::records::{query_params, ContractRecord};
use crate::traits::{AwardLookup, BrowserPage};
use crate::usaspending::award_url;

/// Page carrying the savings table.
pub const SAVINGS_URL: &str = "https://www.doge.gov/savings";

/// The control that swaps the teaser table for the full one.
const VIEW_ALL_CONTRACTS: &str = "View All Contracts";

/// Agency name and contract link of one table row, before the popup
/// has been opened.
#[derive(Debug)]
struct SeedRow {
    agency: String,
    url: Option<String>,
}

/// First table on the page, header row skipped.
fn seed_rows(html: &str) -> Result<Vec<SeedRow>, ScrapeError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;
    let link_sel = selector("a")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or(ScrapeError::TableMissing)?;

    let mut seeds = Vec::new();
    for row in table.select(&row_sel).skip(1) {
        let cells: Vec<_> = row.select(&cell_sel).collect();
        let agency = cells.first().map(|c| element_text(*c)).unwrap_or_default();
        let url = cells
            .get(3)
            .and_then(|c| c.select(&link_sel).next())
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);
        seeds.push(SeedRow { agency, url });
    }
    Ok(seeds)
}

/// Walks the savings table row by row: open the popup, read it, close
/// it, then look every kept row up on USAspending.
pub struct SavingsScraper<P, L> {
    config: ScrapeConfig,
    page: P,
    lookup: L,
}

impl<P: BrowserPage, L: AwardLookup> SavingsScraper<P, L> {
    pub fn new(config: ScrapeConfig, page: P, lookup: L) -> Self {
        Self {
            config,
            page,
            lookup,
        }
    }

    pub async fn scrape(&self) -> Result<Vec<ContractRecord>, ScrapeError> {
        let mut records = self.collect_rows().await?;
        self.enrich(&mut records).await;
        Ok(records)
    }

    pub async fn close(&mut self) -> Result<(), ScrapeError> {
        self.page.close().await
    }

    async fn collect_rows(&self) -> Result<Vec<ContractRecord>, ScrapeError> {
        info!("Navigating to {SAVINGS_URL}");
        self.page.navigate(SAVINGS_URL).await?;

        // Swap in the full table. Anything other than exactly one
        // matching control means the page changed under us.
        let labels = self.page.button_labels().await?;
        let matches: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.as_str() == VIEW_ALL_CONTRACTS)
            .map(|(index, _)| index)
            .collect();
        if matches.len() != 1 {
            return Err(ScrapeError::ControlNotFound {
                label: VIEW_ALL_CONTRACTS.to_string(),
                matches: matches.len(),
            });
        }
        self.page.click_button(matches[0]).await?;

        let html = self.page.content().await?;
        let seeds = seed_rows(&html)?;
        debug!("Found {} table rows", seeds.len());

        let mut records: Vec<ContractRecord> = Vec::new();
        for (index, seed) in seeds.iter().enumerate() {
            if let Some(max) = self.config.max_results {
                if records.len() >= max {
                    break;
                }
            }

            if seed.agency != self.config.agency {
                continue;
            }

            if self.config.log_freq != 0 && records.len() % self.config.log_freq == 0 {
                info!("Scraping data row #{}", records.len() + 1);
            }

            let mut record = ContractRecord {
                agency: Some(seed.agency.clone()),
                url: seed.url.clone(),
                ..Default::default()
            };
            if let Some(url) = &seed.url {
                record.params = query_params(url);
            }

            // Live row index: +1 skips the header row.
            let row = index + 1;
            self.page.scroll_row_into_view(row).await?;
            sleep(self.config.scroll_settle).await;
            self.page.click_table_row(row).await?;

            let appeared = self
                .page
                .wait_for_element(POPUP_HEADING, self.config.popup_timeout)
                .await?;
            if !appeared {
                warn!("No popup for row {index}, keeping a blank record");
                self.debug_screenshot(index).await;
                records.push(ContractRecord::default());
                continue;
            }

            let popup_html = self.page.content().await?;
            match parse_popup(&popup_html) {
                Ok(details) => {
                    record.business_name = Some(details.business_name);
                    record.claimed_savings = details.claimed_savings;
                    record.total_contract = Some(details.total_contract);
                    record.description = Some(details.description);
                    self.page.click_element(POPUP_CLOSE).await?;
                    records.push(record);
                }
                Err(e) => {
                    warn!("Unparseable popup for row {index}: {e}, keeping a blank record");
                    self.debug_screenshot(index).await;
                    records.push(ContractRecord::default());
                    // The popup is open and would swallow the next
                    // row click, so it still has to go.
                    self.page.click_element(POPUP_CLOSE).await?;
                }
            }
        }

        debug!("Done scraping {} rows", records.len());
        Ok(records)
    }

    /// Attach USAspending internal ids and award pages. Lookup
    /// failures degrade to empty columns.
    async fn enrich(&self, records: &mut [ContractRecord]) {
        info!("Getting USA savings URLs");

        for (index, record) in records.iter_mut().enumerate() {
            if self.config.log_freq != 0 && index % self.config.log_freq == 0 {
                info!("Getting USA Savings ID for row #{}", index + 1);
            }

            let piid = match record.piid() {
                Some(piid) => piid.to_string(),
                None => {
                    warn!("Couldn't get internal ID for row {index} without a PIID");
                    continue;
                }
            };
            match self.lookup.internal_id(&piid).await {
                Ok(id) => {
                    record.usa_savings_url = Some(award_url(&id));
                    record.internal_id = Some(id);
                }
                Err(e) => {
                    debug!("Award lookup failed: {e}");
                    warn!("Couldn't get internal ID for PIID {piid}");
                }
            }
        }
    }

    async fn debug_screenshot(&self, row: usize) {
        if !self.config.debug {
            return;
        }
        if let Ok(shot) = self.page.screenshot_png().await {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&shot);
            debug!("Row {row} screenshot: data:image/png;base64,{encoded}");
        }
    }
}
