use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::ScrapeError;

/// One contract row from the savings table, merged with its popup
/// details and the USAspending lookup result.
///
/// Every field is optional: a row whose popup never rendered is kept
/// as an all-empty placeholder so the snapshot still lines up with the
/// table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractRecord {
    pub agency: Option<String>,
    pub url: Option<String>,
    /// Query parameters lifted off the contract link, PIID included.
    pub params: BTreeMap<String, String>,
    pub business_name: Option<String>,
    pub claimed_savings: Option<f64>,
    pub total_contract: Option<f64>,
    pub description: Option<String>,
    pub internal_id: Option<String>,
    pub usa_savings_url: Option<String>,
}

impl ContractRecord {
    pub fn piid(&self) -> Option<&str> {
        self.params.get("PIID").map(String::as_str)
    }

    /// Cell value for one snapshot column. Missing values become
    /// empty cells.
    fn cell(&self, column: &str) -> String {
        match column {
            "agency" => self.agency.clone().unwrap_or_default(),
            "url" => self.url.clone().unwrap_or_default(),
            "business_name" => self.business_name.clone().unwrap_or_default(),
            "claimed_savings" => self.claimed_savings.map(|v| v.to_string()).unwrap_or_default(),
            "total_contract" => self.total_contract.map(|v| v.to_string()).unwrap_or_default(),
            "description" => self.description.clone().unwrap_or_default(),
            "internal_id" => self.internal_id.clone().unwrap_or_default(),
            "usa_savings_url" => self.usa_savings_url.clone().unwrap_or_default(),
            key => self.params.get(key).cloned().unwrap_or_default(),
        }
    }
}

/// Decompose the query string of a contract link into a sorted map.
///
/// Blank values are dropped and the first value wins when a key
/// repeats, so `?PIID=A&PIID=B&x=` yields `{PIID: A}`.
pub fn query_params(href: &str) -> BTreeMap<String, String> {
    let query = match href.split_once('?') {
        Some((_, rest)) => rest,
        None => return BTreeMap::new(),
    };
    let query = match query.split_once('#') {
        Some((q, _)) => q,
        None => query,
    };
    let mut params = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}

const TAIL_COLUMNS: [&str; 6] = [
    "business_name",
    "claimed_savings",
    "total_contract",
    "description",
    "internal_id",
    "usa_savings_url",
];

/// Header for a batch of records: `agency` and `url` first, then every
/// query parameter key seen in the batch in sorted order, then the
/// popup and lookup columns. `PIID` and `modNumber` are always part of
/// the header, so even an all-placeholder batch writes a snapshot the
/// differ can load.
pub fn snapshot_columns(records: &[ContractRecord]) -> Vec<String> {
    let mut param_keys: BTreeSet<String> =
        ["PIID", "modNumber"].iter().map(|k| k.to_string()).collect();
    for record in records {
        param_keys.extend(record.params.keys().cloned());
    }
    let mut columns = vec!["agency".to_string(), "url".to_string()];
    columns.extend(param_keys);
    columns.extend(TAIL_COLUMNS.iter().map(|c| c.to_string()));
    columns
}

pub fn write_snapshot(path: &Path, records: &[ContractRecord]) -> Result<(), ScrapeError> {
    let columns = snapshot_columns(records);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;
    for record in records {
        let row: Vec<String> = columns.iter().map(|c| record.cell(c)).collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn snapshot_filename(stamp: DateTime<Local>) -> String {
    format!("doge_savings_cfpb_{}.csv", stamp.format("%Y-%m-%d__%H-%M-%S"))
}
