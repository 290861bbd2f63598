use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("device_name must not be empty")]
    EmptyDeviceName,
    #[error("min_year {0} is outside 2000..=2024")]
    YearOutOfRange(i32),
}

/// Failures while driving a session against the remote source.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("invalid URL {url}: {reason}")]
    BadUrl { url: String, reason: String },
    #[error("no search form on {0}")]
    NoForm(String),
    #[error("could not find device name input field")]
    NoInputControl,
    #[error("search returned no detail links")]
    NoResults,
    #[error("page {0} has no body")]
    EmptyPage(String),
}

/// Internal parser failures; always converted into a degraded record.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed raw device data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("report count total overflowed for {0}")]
    CountOverflow(String),
}
