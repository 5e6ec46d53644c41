use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScrapeError;
use crate::traits::AwardLookup;

/// Award search endpoint of the USAspending v2 API.
pub const SEARCH_API: &str = "https://api.usaspending.gov/api/v2/search/spending_by_award/";

const TIME_PERIOD_START: &str = "2007-10-01";
const TIME_PERIOD_END: &str = "2025-09-30";

/// Plain contract award type codes, probed first.
const CONTRACT_CODES: [&str; 4] = ["A", "B", "C", "D"];
/// Indefinite-delivery vehicle codes, probed second.
const IDV_CODES: [&str; 8] = [
    "IDV_A", "IDV_B", "IDV_B_A", "IDV_B_B", "IDV_B_C", "IDV_C", "IDV_D", "IDV_E",
];

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.2 Safari/605.1.15";

/// Public page for an award, keyed by its internal id.
pub fn award_url(internal_id: &str) -> String {
    format!("https://www.usaspending.gov/award/{internal_id}")
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    filters: SearchFilters<'a>,
    fields: [&'a str; 1],
    limit: u32,
}

#[derive(Debug, Serialize)]
struct SearchFilters<'a> {
    time_period: [TimePeriod<'a>; 1],
    award_type_codes: &'a [&'a str],
    award_ids: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct TimePeriod<'a> {
    start_date: &'a str,
    end_date: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    generated_internal_id: String,
}

/// Looks awards up by PIID through the spending-by-award search.
///
/// The search browser sends a characteristic set of headers; the API
/// rejects anonymous-looking clients, so the client mimics them.
pub struct UsaSpendingClient {
    client: reqwest::Client,
    endpoint: String,
}

impl UsaSpendingClient {
    pub fn new() -> Result<Self, ScrapeError> {
        Self::with_endpoint(SEARCH_API)
    }

    /// Point the client at a different endpoint, e.g. a local stand-in.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.usaspending.gov"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.usaspending.gov/"));
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("USASpendingFrontend"),
        );
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// One POST against one award type code group. `Ok(None)` when the
    /// group has no exact match.
    async fn probe(&self, piid: &str, codes: &[&str]) -> Result<Option<String>, ScrapeError> {
        let body = SearchRequest {
            filters: SearchFilters {
                time_period: [TimePeriod {
                    start_date: TIME_PERIOD_START,
                    end_date: TIME_PERIOD_END,
                }],
                award_type_codes: codes,
                award_ids: [piid],
            },
            fields: ["Award ID"],
            limit: 1,
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        if response.status() != StatusCode::OK {
            return Err(ScrapeError::LookupStatus {
                status: response.status().as_u16(),
            });
        }
        let mut parsed: SearchResponse = response.json().await?;
        debug!(
            "search POST for {piid} over {} codes returned {} results",
            codes.len(),
            parsed.results.len()
        );
        if parsed.results.len() == 1 {
            Ok(Some(parsed.results.remove(0).generated_internal_id))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl AwardLookup for UsaSpendingClient {
    async fn internal_id(&self, piid: &str) -> Result<String, ScrapeError> {
        for codes in [CONTRACT_CODES.as_slice(), IDV_CODES.as_slice()] {
            if let Some(id) = self.probe(piid, codes).await? {
                return Ok(id);
            }
        }
        Err(ScrapeError::AwardNotFound {
            piid: piid.to_string(),
        })
    }
}
