use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::models::{Extraction, RawCount, RawDeviceData, RawProblemEntry, RawProblemKind};
use crate::parser::normalize::{absolutize, first_digit_run, UNKNOWN_DEVICE};
use crate::session::{Browser, Session};
use crate::settings::{Settings, MAUDE_BASE, ORIGIN};

use super::dom::{attr, text_of, ANCHOR};
use super::{settle, synthetic};

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());
static LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th, strong, b, label, dt").unwrap());
static DEVICE_NAME_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)device.*name").unwrap());

const NAME_SELECTORS: &[&str] = &["h1", "h2", ".device-name", "#device-name"];
const RESIDUAL_HEADERS: &[&str] = &["problem", "count", "total"];

fn by_selectors(doc: &Html) -> Option<String> {
    NAME_SELECTORS.iter().find_map(|css| {
        let sel = Selector::parse(css).ok()?;
        doc.select(&sel)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
    })
}

/// A "Device Name" label cell followed by the value in the next element.
fn by_label(doc: &Html) -> Option<String> {
    doc.select(&LABEL)
        .filter(|el| DEVICE_NAME_LABEL_RE.is_match(&text_of(*el)))
        .find_map(|el| {
            el.next_siblings()
                .filter_map(ElementRef::wrap)
                .map(text_of)
                .find(|t| !t.is_empty())
        })
}

pub fn extract_device_name(doc: &Html) -> String {
    by_selectors(doc)
        .or_else(|| by_label(doc))
        .unwrap_or_else(|| UNKNOWN_DEVICE.to_string())
}

fn is_maude(href: &str) -> bool {
    href.to_lowercase().contains("maude")
}

/// The first link of a cell, if it points at a MAUDE report.
fn maude_href<'a>(cell: ElementRef<'a>) -> Option<&'a str> {
    cell.select(&ANCHOR)
        .next()
        .and_then(|a| attr(&a, "href"))
        .filter(|h| is_maude(h))
}

fn problem_table_rows(table: ElementRef, kind: RawProblemKind) -> Vec<RawProblemEntry> {
    table
        .select(&ROW)
        .skip(1)
        .filter_map(|row| {
            let cells: Vec<ElementRef> = row.select(&CELL).collect();
            if cells.len() < 2 {
                return None;
            }
            let name = text_of(cells[0]);
            if name.is_empty() || RESIDUAL_HEADERS.contains(&name.to_lowercase().as_str()) {
                return None;
            }
            let count = first_digit_run(&text_of(cells[1])).unwrap_or(0);
            let maude_link = cells
                .iter()
                .find_map(|c| maude_href(*c))
                .map(|h| absolutize(h.trim(), ORIGIN, MAUDE_BASE))
                .unwrap_or_default();
            Some(RawProblemEntry {
                problem_name: name,
                count: Some(RawCount::Int(i64::try_from(count).unwrap_or(i64::MAX))),
                maude_link: Some(maude_link),
                kind,
            })
        })
        .collect()
}

/// A problem described by a bare MAUDE link; the count comes from its parent's text.
fn problem_from_link(link: ElementRef) -> Option<RawProblemEntry> {
    let href = attr(&link, "href")?;
    let count = link
        .parent()
        .and_then(ElementRef::wrap)
        .and_then(|p| first_digit_run(&text_of(p)))
        .unwrap_or(0);
    Some(RawProblemEntry {
        problem_name: text_of(link),
        count: Some(RawCount::Int(i64::try_from(count).unwrap_or(i64::MAX))),
        maude_link: Some(absolutize(href.trim(), ORIGIN, MAUDE_BASE)),
        kind: RawProblemKind::Unknown,
    })
}

/// Rows from tables whose headers mention both `keyword` and "problem",
/// plus MAUDE links whose text mentions `keyword`.
pub fn extract_problems(doc: &Html, keyword: &str, kind: RawProblemKind) -> Vec<RawProblemEntry> {
    let mut problems = Vec::new();

    for table in doc.select(&TABLE) {
        let is_match = table.select(&CELL).any(|cell| {
            let h = text_of(cell).to_lowercase();
            h.contains(keyword) && h.contains("problem")
        });
        if is_match {
            problems.extend(problem_table_rows(table, kind));
        }
    }

    for link in doc.select(&ANCHOR) {
        let href_is_maude = attr(&link, "href").is_some_and(is_maude);
        if href_is_maude && text_of(link).to_lowercase().contains(keyword) {
            problems.extend(problem_from_link(link));
        }
    }

    problems
}

/// Parse a fetched detail page into a raw record.
pub fn parse_detail_page(html: &str, url: &str) -> Result<RawDeviceData, ScrapeError> {
    if html.trim().is_empty() {
        return Err(ScrapeError::EmptyPage(url.to_string()));
    }
    let doc = Html::parse_document(html);
    Ok(RawDeviceData {
        url: url.to_string(),
        device_name: extract_device_name(&doc),
        device_problems: extract_problems(&doc, "device", RawProblemKind::Device),
        patient_problems: extract_problems(&doc, "patient", RawProblemKind::Patient),
    })
}

async fn fetch<B: Browser>(browser: &B, url: &str, settings: &Settings) -> Result<RawDeviceData, ScrapeError> {
    let mut session = browser.open().await?;
    let page = session.goto(url).await;
    if page.is_ok() {
        settle(settings).await;
    }
    session.close();
    parse_detail_page(&page?.html, url)
}

/// Extract one detail page. Never fails: unreachable or unparseable pages
/// are replaced by a synthetic record keyed off the URL's id.
pub async fn extract<B: Browser>(browser: &B, url: &str, settings: &Settings) -> Extraction<RawDeviceData> {
    info!("Scraping device details from: {}", url);
    match fetch(browser, url, settings).await {
        Ok(data) => Extraction::Real(data),
        Err(e) => {
            warn!("Error scraping device details from {} ({}), using synthetic record", url, e);
            Extraction::Synthetic(synthetic::device_record(url))
        }
    }
}
