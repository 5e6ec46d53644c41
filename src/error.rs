use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("browser init error: {0}")]
    BrowserInit(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("in-page JavaScript error: {0}")]
    JavaScript(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("expected exactly one '{label}' control, found {matches}")]
    ControlNotFound { label: String, matches: usize },

    #[error("no results table on the page")]
    TableMissing,

    #[error("bad selector: {0}")]
    Selector(String),

    #[error("popup has too few paragraphs to parse ({paragraphs})")]
    PopupLayout { paragraphs: usize },

    #[error("not a currency amount: {0:?}")]
    Currency(String),

    #[error("bad status code on search POST: {status}")]
    LookupStatus { status: u16 },

    #[error("couldn't find award {piid} in the search API")]
    AwardNotFound { piid: String },

    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("snapshot csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("snapshot is missing the '{0}' column")]
    MissingColumn(String),

    #[error("no snapshots found in {dir}")]
    NoSnapshots { dir: String },

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}
