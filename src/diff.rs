use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::ScrapeError;

/// Columns never compared between snapshots: they churn on every run
/// without the contract itself changing.
const VOLATILE_COLUMNS: [&str; 3] = ["url", "internal_id", "usa_savings_url"];

/// Columns shown for added and removed rows.
const ROW_COLUMNS: [&str; 6] = [
    "PIID",
    "modNumber",
    "business_name",
    "claimed_savings",
    "total_contract",
    "description",
];

/// One loaded snapshot CSV, rows kept as column-name maps so files
/// from runs with different parameter columns still diff cleanly.
#[derive(Debug)]
pub struct Snapshot {
    pub path: PathBuf,
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl Snapshot {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ScrapeError> {
        let path = path.into();
        let mut reader = csv::Reader::from_path(&path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        if !columns.iter().any(|c| c == "PIID") {
            return Err(ScrapeError::MissingColumn("PIID".to_string()));
        }
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row = columns
                .iter()
                .cloned()
                .zip(record.iter().map(String::from))
                .collect();
            rows.push(row);
        }
        Ok(Self {
            path,
            columns,
            rows,
        })
    }

    /// PIIDs present in this snapshot. Blank ones (placeholder rows)
    /// cannot be tracked across snapshots and are left out.
    fn piids(&self) -> HashSet<&str> {
        self.rows
            .iter()
            .map(|row| piid_of(row))
            .filter(|piid| !piid.is_empty())
            .collect()
    }

    /// First row per PIID, in PIID order.
    fn first_by_piid(&self) -> BTreeMap<&str, &BTreeMap<String, String>> {
        let mut map = BTreeMap::new();
        for row in &self.rows {
            let piid = piid_of(row);
            if !piid.is_empty() {
                map.entry(piid).or_insert(row);
            }
        }
        map
    }
}

fn piid_of(row: &BTreeMap<String, String>) -> &str {
    row.get("PIID").map(String::as_str).unwrap_or("")
}

fn cell(row: &BTreeMap<String, String>, column: &str) -> String {
    row.get(column).cloned().unwrap_or_default()
}

/// Value tuple a row is compared by. `with_mod_number` keeps the
/// modNumber column in the tuple.
fn fingerprint(
    columns: &[String],
    row: &BTreeMap<String, String>,
    with_mod_number: bool,
) -> Vec<String> {
    columns
        .iter()
        .filter(|column| {
            let column = column.as_str();
            !VOLATILE_COLUMNS.contains(&column) && (with_mod_number || column != "modNumber")
        })
        .map(|column| cell(row, column))
        .collect()
}

/// New and old version of one contract that moved between snapshots.
#[derive(Debug)]
pub struct RowChange {
    pub piid: String,
    pub new_row: BTreeMap<String, String>,
    pub old_row: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct DiffReport {
    pub new_path: PathBuf,
    pub old_path: PathBuf,
    /// Rows of the new snapshot whose PIID the old one lacks.
    pub added: Vec<BTreeMap<String, String>>,
    /// Rows of the old snapshot whose PIID the new one lacks.
    pub removed: Vec<BTreeMap<String, String>>,
    /// Contracts whose values changed beyond modNumber.
    pub changed: Vec<RowChange>,
    /// Contracts where only modNumber moved.
    pub mod_only: Vec<RowChange>,
}

/// Compare two snapshots by PIID.
///
/// Contracts in both snapshots are compared on their first occurrence
/// each, over the new snapshot's columns. Changes split into two
/// buckets: modNumber churns on a lag as FPDS catches up, so a
/// modNumber-only move is routine while anything else is worth a look.
pub fn diff(new: &Snapshot, old: &Snapshot) -> DiffReport {
    let new_piids = new.piids();
    let old_piids = old.piids();

    let added = new
        .rows
        .iter()
        .filter(|row| {
            let piid = piid_of(row);
            !piid.is_empty() && !old_piids.contains(piid)
        })
        .cloned()
        .collect();
    let removed = old
        .rows
        .iter()
        .filter(|row| {
            let piid = piid_of(row);
            !piid.is_empty() && !new_piids.contains(piid)
        })
        .cloned()
        .collect();

    let old_first = old.first_by_piid();
    let mut changed = Vec::new();
    let mut mod_only = Vec::new();
    for (piid, new_row) in new.first_by_piid() {
        if let Some(old_row) = old_first.get(piid) {
            let change = || RowChange {
                piid: piid.to_string(),
                new_row: (*new_row).clone(),
                old_row: (**old_row).clone(),
            };
            if fingerprint(&new.columns, new_row, false)
                != fingerprint(&new.columns, old_row, false)
            {
                changed.push(change());
            } else if fingerprint(&new.columns, new_row, true)
                != fingerprint(&new.columns, old_row, true)
            {
                mod_only.push(change());
            }
        }
    }

    DiffReport {
        new_path: new.path.clone(),
        old_path: old.path.clone(),
        added,
        removed,
        changed,
        mod_only,
    }
}

impl DiffReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("****************\n");
        out.push_str("Scrape Diff:\n");
        out.push_str(&format!("new = {}\n", self.new_path.display()));
        out.push_str(&format!("old = {}\n", self.old_path.display()));
        out.push('\n');

        out.push_str(&format!("**Rows Added: {}\n", self.added.len()));
        if !self.added.is_empty() {
            out.push_str(&render_rows(&self.added));
        }
        out.push('\n');

        out.push_str(&format!("**Rows Removed: {}\n", self.removed.len()));
        if !self.removed.is_empty() {
            out.push_str(&render_rows(&self.removed));
        }
        out.push('\n');

        out.push_str(&format!(
            "**Rows Modified - values other than 'modNumber' changed: {}\n",
            self.changed.len()
        ));
        if !self.changed.is_empty() {
            out.push_str(&render_changes(
                &self.changed,
                &[
                    "modNumber",
                    "business_name",
                    "claimed_savings",
                    "total_contract",
                    "description",
                ],
            ));
        }
        out.push('\n');

        out.push_str(&format!(
            "**Rows Modified - only 'modNumber' changed: {}\n",
            self.mod_only.len()
        ));
        if !self.mod_only.is_empty() {
            out.push_str(&render_changes(
                &self.mod_only,
                &["modNumber", "business_name", "description"],
            ));
        }
        out
    }
}

fn render_rows(rows: &[BTreeMap<String, String>]) -> String {
    let data: Vec<Vec<String>> = rows
        .iter()
        .map(|row| ROW_COLUMNS.iter().map(|column| cell(row, column)).collect())
        .collect();
    render_table(&ROW_COLUMNS, &data)
}

fn render_changes(changes: &[RowChange], columns: &[&str]) -> String {
    let mut headers = vec!["PIID", "version"];
    headers.extend_from_slice(columns);
    let mut data = Vec::new();
    for change in changes {
        for (version, row) in [("new", &change.new_row), ("old", &change.old_row)] {
            let mut cells = vec![change.piid.clone(), version.to_string()];
            cells.extend(columns.iter().map(|column| cell(row, column)));
            data.push(cells);
        }
    }
    render_table(&headers, &data)
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }
    let mut out = String::new();
    let mut line = String::new();
    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(&format!("{header:<width$}", width = widths[i]));
    }
    out.push_str(line.trim_end());
    out.push('\n');
    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                line.push_str("  ");
            }
            line.push_str(&format!("{cell:<width$}", width = widths[i]));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[derive(Debug)]
pub struct SnapshotSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub claimed_savings: f64,
    pub total_ceiling: f64,
}

/// Roll a snapshot up: row count plus claimed and ceiling totals.
/// Blank and unparseable cells count as nothing.
pub fn summarize(snapshot: &Snapshot) -> SnapshotSummary {
    SnapshotSummary {
        path: snapshot.path.clone(),
        rows: snapshot.rows.len(),
        claimed_savings: column_sum(snapshot, "claimed_savings"),
        total_ceiling: column_sum(snapshot, "total_contract"),
    }
}

fn column_sum(snapshot: &Snapshot, column: &str) -> f64 {
    snapshot
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter_map(|cell| cell.parse::<f64>().ok())
        .sum()
}

impl SnapshotSummary {
    /// Claimed savings as a share of the ceiling. An all-empty
    /// snapshot has saved nothing.
    pub fn percent_saved(&self) -> f64 {
        if self.total_ceiling == 0.0 {
            0.0
        } else {
            self.claimed_savings / self.total_ceiling * 100.0
        }
    }

    pub fn render(&self) -> String {
        format!(
            "****************\n\
             Summary of scrape at: {}\n\
             {} rows\n\
             claimed savings: {}\n\
             total ceiling: {}\n\
             claimed saving percent: {:.3}%\n\n",
            self.path.display(),
            self.rows,
            format_thousands(self.claimed_savings),
            format_thousands(self.total_ceiling),
            self.percent_saved(),
        )
    }
}

/// `1234567.891` -> `1,234,567.89`.
fn format_thousands(value: f64) -> String {
    let formatted = format!("{value:.2}");
    let (sign, rest) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted.as_str()),
    };
    let (int_part, frac_part) = rest.split_once('.').unwrap_or((rest, "00"));
    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{frac_part}")
}

/// Newest snapshot in `data_dir` paired with the one `base_index`
/// steps back, by reverse filename order. The timestamped names sort
/// chronologically, so this is newest-first.
pub fn latest_pair(data_dir: &Path, base_index: usize) -> Result<(PathBuf, PathBuf), ScrapeError> {
    let mut names: Vec<String> = std::fs::read_dir(data_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.to_ascii_lowercase() == "csv")
                .unwrap_or(false)
        })
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names.reverse();

    if names.is_empty() {
        return Err(ScrapeError::NoSnapshots {
            dir: data_dir.display().to_string(),
        });
    }

    let mut base_index = base_index;
    if base_index >= names.len() {
        warn!(
            "Requested index ({}) is farther back than available scrapes, using the oldest one ({})",
            base_index,
            names.len() - 1
        );
        base_index = names.len() - 1;
    }

    Ok((data_dir.join(&names[0]), data_dir.join(&names[base_index])))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: [&str; 10] = [
        "agency",
        "url",
        "PIID",
        "modNumber",
        "business_name",
        "claimed_savings",
        "total_contract",
        "description",
        "internal_id",
        "usa_savings_url",
    ];

    fn snap(path: &str, rows: &[&[&str]]) -> Snapshot {
        Snapshot {
            path: PathBuf::from(path),
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|cells| {
                    COLUMNS
                        .iter()
                        .zip(cells.iter())
                        .map(|(c, v)| (c.to_string(), v.to_string()))
                        .collect()
                })
                .collect(),
        }
    }

    fn row<'a>(
        piid: &'a str,
        mod_number: &'a str,
        business: &'a str,
        claimed: &'a str,
        total: &'a str,
        url: &'a str,
    ) -> Vec<&'a str> {
        vec![
            "CFPB", url, piid, mod_number, business, claimed, total, "desc", "", "",
        ]
    }

    #[test]
    fn added_and_removed_by_piid() {
        let new = snap(
            "new.csv",
            &[
                &row("AAA", "0", "ACME", "1", "2", "u1"),
                &row("CCC", "0", "GAMMA", "1", "2", "u3"),
            ],
        );
        let old = snap(
            "old.csv",
            &[
                &row("AAA", "0", "ACME", "1", "2", "u9"),
                &row("BBB", "0", "BETA", "1", "2", "u2"),
            ],
        );

        let report = diff(&new, &old);
        assert_eq!(report.added.len(), 1);
        assert_eq!(piid_of(&report.added[0]), "CCC");
        assert_eq!(report.removed.len(), 1);
        assert_eq!(piid_of(&report.removed[0]), "BBB");
        // AAA differs only in the volatile url column.
        assert!(report.changed.is_empty());
        assert!(report.mod_only.is_empty());
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let rows = [
            row("AAA", "0", "ACME", "1", "2", "u1"),
            row("BBB", "3", "BETA", "5", "6", "u2"),
        ];
        let new = snap("new.csv", &[&rows[0], &rows[1]]);
        let old = snap("old.csv", &[&rows[0], &rows[1]]);

        let report = diff(&new, &old);
        assert!(report.added.is_empty());
        assert!(report.removed.is_empty());
        assert!(report.changed.is_empty());
        assert!(report.mod_only.is_empty());
    }

    #[test]
    fn change_buckets_split_on_mod_number() {
        let new = snap(
            "new.csv",
            &[
                &row("AAA", "0", "ACME RENAMED", "1", "2", "u"),
                &row("BBB", "3", "BETA", "1", "2", "u"),
                &row("CCC", "0", "GAMMA", "1", "2", "u"),
            ],
        );
        let old = snap(
            "old.csv",
            &[
                &row("AAA", "0", "ACME", "1", "2", "u"),
                &row("BBB", "1", "BETA", "1", "2", "u"),
                &row("CCC", "0", "GAMMA", "1", "2", "u"),
            ],
        );

        let report = diff(&new, &old);
        assert!(report.added.is_empty());
        assert!(report.removed.is_empty());
        assert_eq!(report.changed.len(), 1);
        assert_eq!(report.changed[0].piid, "AAA");
        assert_eq!(report.mod_only.len(), 1);
        assert_eq!(report.mod_only[0].piid, "BBB");
    }

    #[test]
    fn placeholder_rows_stay_out_of_the_diff() {
        let blank: Vec<&str> = vec![""; COLUMNS.len()];
        let new = snap(
            "new.csv",
            &[&blank, &row("AAA", "0", "ACME", "1", "2", "u")],
        );
        let old = snap("old.csv", &[&row("AAA", "0", "ACME", "1", "2", "u")]);

        let report = diff(&new, &old);
        assert!(report.added.is_empty());
        assert!(report.removed.is_empty());
        assert!(report.changed.is_empty());
    }

    #[test]
    fn duplicate_piids_compare_first_occurrences() {
        let new = snap(
            "new.csv",
            &[
                &row("AAA", "0", "ACME", "1", "2", "u"),
                &row("AAA", "9", "ACME SECOND", "9", "9", "u"),
            ],
        );
        let old = snap("old.csv", &[&row("AAA", "0", "ACME", "1", "2", "u")]);

        let report = diff(&new, &old);
        assert!(report.added.is_empty());
        assert!(report.changed.is_empty());
        assert!(report.mod_only.is_empty());
    }

    #[test]
    fn report_renders_counts_and_tables() {
        let new = snap(
            "data/new.csv",
            &[
                &row("AAA", "0", "ACME", "1", "2", "u"),
                &row("BBB", "2", "BETA", "1", "2", "u"),
            ],
        );
        let old = snap("data/old.csv", &[&row("BBB", "1", "BETA", "1", "2", "u")]);

        let rendered = diff(&new, &old).render();
        assert!(rendered.starts_with("****************\nScrape Diff:\n"));
        assert!(rendered.contains("new = data/new.csv"));
        assert!(rendered.contains("old = data/old.csv"));
        assert!(rendered.contains("**Rows Added: 1"));
        assert!(rendered.contains("**Rows Removed: 0"));
        assert!(rendered.contains("**Rows Modified - only 'modNumber' changed: 1"));
        // Added table lists AAA with its headline columns.
        assert!(rendered.contains("PIID"));
        assert!(rendered.contains("AAA"));
        // Keyed table shows the new row above the old one.
        let lines: Vec<&str> = rendered.lines().collect();
        let new_line = lines
            .iter()
            .position(|l| l.starts_with("BBB") && l.contains("new"))
            .unwrap();
        let old_line = lines
            .iter()
            .position(|l| l.starts_with("BBB") && l.contains("old"))
            .unwrap();
        assert!(new_line < old_line);
    }

    #[test]
    fn summary_totals_skip_blank_cells() {
        use crate::records::{query_params, write_snapshot, ContractRecord};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.csv");
        let records = vec![
            ContractRecord {
                params: query_params("https://fpds.test/view?PIID=AAA&modNumber=0"),
                claimed_savings: Some(100.0),
                total_contract: Some(1000.0),
                ..Default::default()
            },
            ContractRecord {
                params: query_params("https://fpds.test/view?PIID=BBB&modNumber=0"),
                claimed_savings: None,
                total_contract: Some(500.0),
                ..Default::default()
            },
        ];
        write_snapshot(&path, &records).unwrap();

        let summary = summarize(&Snapshot::load(&path).unwrap());
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.claimed_savings, 100.0);
        assert_eq!(summary.total_ceiling, 1500.0);

        let rendered = summary.render();
        assert!(rendered.contains("2 rows"));
        assert!(rendered.contains("claimed savings: 100.00"));
        assert!(rendered.contains("total ceiling: 1,500.00"));
        assert!(rendered.contains("claimed saving percent: 6.667%"));
    }

    #[test]
    fn all_placeholder_snapshot_still_loads() {
        use crate::records::{write_snapshot, ContractRecord};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("placeholders.csv");
        write_snapshot(&path, &[ContractRecord::default()]).unwrap();

        let snapshot = Snapshot::load(&path).unwrap();
        assert_eq!(snapshot.rows.len(), 1);

        let report = diff(&snapshot, &snapshot);
        assert!(report.added.is_empty());
        assert!(report.changed.is_empty());
        assert_eq!(summarize(&snapshot).percent_saved(), 0.0);
    }

    #[test]
    fn empty_snapshot_saves_nothing() {
        let summary = summarize(&snap("empty.csv", &[]));
        assert_eq!(summary.percent_saved(), 0.0);
        assert!(summary.render().contains("claimed saving percent: 0.000%"));
    }

    #[test]
    fn loading_without_piid_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "agency,business_name\nCFPB,ACME\n").unwrap();
        let err = Snapshot::load(&path).unwrap_err();
        assert!(matches!(err, ScrapeError::MissingColumn(column) if column == "PIID"));
    }

    #[test]
    fn latest_pair_picks_newest_and_base() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "doge_savings_cfpb_2025-05-01__10-00-00.csv",
            "doge_savings_cfpb_2025-06-01__10-00-00.csv",
            "doge_savings_cfpb_2025-07-01__10-00-00.csv",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), "PIID\n").unwrap();
        }

        let (newest, base) = latest_pair(dir.path(), 1).unwrap();
        assert!(newest.ends_with("doge_savings_cfpb_2025-07-01__10-00-00.csv"));
        assert!(base.ends_with("doge_savings_cfpb_2025-06-01__10-00-00.csv"));

        // An index past the end clamps to the oldest snapshot.
        let (_, base) = latest_pair(dir.path(), 99).unwrap();
        assert!(base.ends_with("doge_savings_cfpb_2025-05-01__10-00-00.csv"));
    }

    #[test]
    fn latest_pair_needs_at_least_one_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let err = latest_pair(dir.path(), 1).unwrap_err();
        assert!(matches!(err, ScrapeError::NoSnapshots { .. }));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(1234567.891), "1,234,567.89");
        assert_eq!(format_thousands(1000.0), "1,000.00");
        assert_eq!(format_thousands(100.0), "100.00");
        assert_eq!(format_thousands(0.0), "0.00");
        assert_eq!(format_thousands(-1234.5), "-1,234.50");
    }
}
