//! Offline `Browser` serving the HTML fixtures under `tests/fixtures/`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::session::{Browser, FormSubmission, Page, Session};
use crate::settings::SEARCH_URL;

pub const DETAIL_URL: &str = "https://www.accessdata.fda.gov/scripts/cdrh/cfdocs/cfTPLC/tplc.cfm?id=4321";

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
}

#[derive(Clone)]
pub struct FixtureBrowser {
    pages: HashMap<String, String>,
    results: String,
    offline: bool,
    open: Arc<AtomicUsize>,
}

impl FixtureBrowser {
    /// Search page, results page and one detail page (`DETAIL_URL`).
    pub fn tplc() -> Self {
        let mut pages = HashMap::new();
        pages.insert(SEARCH_URL.to_string(), fixture("search_form"));
        pages.insert(DETAIL_URL.to_string(), fixture("device_detail"));
        FixtureBrowser {
            pages,
            results: fixture("search_results"),
            offline: false,
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every `open` fails, as if no session could be started.
    pub fn offline() -> Self {
        FixtureBrowser {
            pages: HashMap::new(),
            results: String::new(),
            offline: true,
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_results(mut self, html: &str) -> Self {
        self.results = html.to_string();
        self
    }

    /// Sessions opened and not yet released.
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for FixtureBrowser {
    type Session = FixtureSession;

    async fn open(&self) -> Result<FixtureSession, ScrapeError> {
        if self.offline {
            return Err(ScrapeError::Status {
                url: "session".into(),
                status: 503,
            });
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(FixtureSession {
            pages: self.pages.clone(),
            results: self.results.clone(),
            open: Arc::clone(&self.open),
        })
    }
}

pub struct FixtureSession {
    pages: HashMap<String, String>,
    results: String,
    open: Arc<AtomicUsize>,
}

impl Drop for FixtureSession {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for FixtureSession {
    async fn goto(&mut self, url: &str) -> Result<Page, ScrapeError> {
        match self.pages.get(url) {
            Some(html) => Ok(Page {
                url: url.to_string(),
                html: html.clone(),
            }),
            None => Err(ScrapeError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn submit(&mut self, form: &FormSubmission) -> Result<Page, ScrapeError> {
        Ok(Page {
            url: form.action.clone(),
            html: self.results.clone(),
        })
    }

    fn close(self) {}
}
