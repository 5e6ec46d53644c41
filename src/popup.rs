use scraper::{ElementRef, Html, Selector};

use crate::error::ScrapeError;

/// Heading inside the detail overlay. Used both to wait for the popup
/// and to read the business name.
pub const POPUP_HEADING: &str = "div.fixed h3";
/// Close control of the detail overlay.
pub const POPUP_CLOSE: &str = "div.fixed button:nth-child(2)";

const POPUP_PARAGRAPHS: &str = "div.fixed p";

/// Fields lifted from one contract's detail popup. Only the claimed
/// savings can legitimately be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupDetails {
    pub business_name: String,
    pub claimed_savings: Option<f64>,
    pub total_contract: f64,
    pub description: String,
}

/// Parse the detail overlay out of a rendered page.
///
/// The overlay has no stable ids, so fields are anchored to the tail
/// of its `<p>` list: with six or more paragraphs the claimed savings,
/// contract ceiling and description sit at fixed offsets from the end;
/// shorter popups omit the claimed savings. A popup without its
/// heading does not parse.
pub fn parse_popup(html: &str) -> Result<PopupDetails, ScrapeError> {
    let document = Html::parse_document(html);

    let heading = selector(POPUP_HEADING)?;
    let business_name = document
        .select(&heading)
        .next()
        .map(element_text)
        .ok_or_else(|| ScrapeError::ElementNotFound(POPUP_HEADING.to_string()))?;

    let paragraphs = selector(POPUP_PARAGRAPHS)?;
    let texts: Vec<String> = document.select(&paragraphs).map(element_text).collect();

    let details = match texts.len() {
        n if n >= 6 => PopupDetails {
            business_name,
            claimed_savings: Some(parse_currency(&texts[n - 5])?),
            total_contract: parse_currency(&texts[n - 3])?,
            description: texts[n - 1].clone(),
        },
        n if n >= 2 => PopupDetails {
            business_name,
            claimed_savings: None,
            total_contract: parse_currency(&texts[n - 2])?,
            description: texts[n - 1].clone(),
        },
        n => return Err(ScrapeError::PopupLayout { paragraphs: n }),
    };
    Ok(details)
}

/// Parse a dollar amount like `$1,234.56`.
pub fn parse_currency(text: &str) -> Result<f64, ScrapeError> {
    let cleaned = text.replace('$', "").replace(',', "");
    cleaned
        .trim()
        .parse()
        .map_err(|_| ScrapeError::Currency(text.to_string()))
}

pub(crate) fn selector(raw: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(raw).map_err(|e| ScrapeError::Selector(e.to_string()))
}

pub(crate) fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
