use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

pub const ORIGIN: &str = "https://www.accessdata.fda.gov";
pub const SEARCH_URL: &str = "https://www.accessdata.fda.gov/scripts/cdrh/cfdocs/cfTPLC/tplc.cfm";
pub const TPLC_BASE: &str = "https://www.accessdata.fda.gov/scripts/cdrh/cfdocs/cfTPLC/";
pub const MAUDE_BASE: &str = "https://www.accessdata.fda.gov/scripts/cdrh/cfdocs/cfmaude/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Runtime settings. Every field can be overridden with a `TPLC_` env var,
/// e.g. `TPLC_PAGE_TIMEOUT_SECS=30`. `ORIGIN` and `MAUDE_BASE` are fixed:
/// link cleaning resolves against them and must agree with extraction.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub search_url: String,
    pub tplc_base: String,
    pub user_agent: String,
    pub page_timeout_secs: u64,
    pub results_settle_ms: u64,
    pub bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            search_url: SEARCH_URL.to_string(),
            tplc_base: TPLC_BASE.to_string(),
            user_agent: USER_AGENT.to_string(),
            page_timeout_secs: 15,
            results_settle_ms: 0,
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let d = Settings::default();
        let settings = config::Config::builder()
            .set_default("search_url", d.search_url)?
            .set_default("tplc_base", d.tplc_base)?
            .set_default("user_agent", d.user_agent)?
            .set_default("page_timeout_secs", d.page_timeout_secs as i64)?
            .set_default("results_settle_ms", d.results_settle_ms as i64)?
            .set_default("bind", d.bind)?
            .add_source(config::Environment::with_prefix("TPLC"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn results_settle(&self) -> Duration {
        Duration::from_millis(self.results_settle_ms)
    }
}
