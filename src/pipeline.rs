use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::models::{AggregateSummary, SearchQuery};
use crate::parser::{aggregate, device};
use crate::session::Browser;
use crate::settings::Settings;
use crate::tplc::{detail, search};

pub const NO_DEVICES_MESSAGE: &str = "No devices found matching the search criteria";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScrapeResponse {
    NoDevices {
        search_params: SearchQuery,
        message: &'static str,
        devices: Vec<Value>,
    },
    Devices {
        search_params: SearchQuery,
        total_devices_found: usize,
        /// True when the detail links were fabricated rather than scraped.
        synthetic_search: bool,
        devices: Vec<Value>,
        aggregate_summary: AggregateSummary,
    },
}

impl ScrapeResponse {
    pub fn devices(&self) -> &[Value] {
        match self {
            ScrapeResponse::NoDevices { devices, .. } | ScrapeResponse::Devices { devices, .. } => {
                devices
            }
        }
    }
}

async fn process_device<B: Browser>(browser: &B, url: &str, settings: &Settings) -> Result<Value> {
    let extraction = detail::extract(browser, url, settings).await;
    let mut record = device::parse(extraction.get());
    record.data_source = extraction.source();
    if record.is_degraded() {
        warn!("Device at {} could not be parsed; keeping degraded record", url);
    }
    serde_json::to_value(&record).with_context(|| format!("serializing device record for {}", url))
}

/// Search, then extract and parse each detail page one at a time, then
/// aggregate. A device that fails is logged and left out.
pub async fn run<B: Browser>(query: &SearchQuery, browser: &B, settings: &Settings) -> Result<ScrapeResponse> {
    info!(
        "Starting scrape for device: {}, product_code: {:?}, min_year: {}",
        query.device_name, query.product_code, query.min_year
    );

    let links = search::search(browser, query, settings).await;
    let synthetic_search = links.is_synthetic();
    let links = links.into_inner();

    if links.is_empty() {
        return Ok(ScrapeResponse::NoDevices {
            search_params: query.clone(),
            message: NO_DEVICES_MESSAGE,
            devices: Vec::new(),
        });
    }

    info!("Found {} device links to scrape", links.len());

    let mut records = Vec::with_capacity(links.len());
    for link in &links {
        match process_device(browser, link, settings).await {
            Ok(record) => records.push(record),
            Err(e) => {
                error!("Error processing device {}: {:#}", link, e);
                continue;
            }
        }
    }

    let aggregated = aggregate::format(records);
    info!("Successfully scraped {} devices", aggregated.devices.len());

    Ok(ScrapeResponse::Devices {
        search_params: query.clone(),
        total_devices_found: aggregated.devices.len(),
        synthetic_search,
        devices: aggregated.devices,
        aggregate_summary: aggregated.aggregate_summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tplc::testing::FixtureBrowser;

    fn query() -> SearchQuery {
        SearchQuery::new("pacemaker", Some("DXY".into()), 2021).unwrap()
    }

    #[tokio::test]
    async fn live_and_synthetic_devices_mixed() {
        let browser = FixtureBrowser::tplc();
        let out = run(&query(), &browser, &Settings::default()).await.unwrap();
        let ScrapeResponse::Devices {
            total_devices_found,
            synthetic_search,
            devices,
            aggregate_summary,
            ..
        } = out
        else {
            panic!("expected devices");
        };
        assert!(!synthetic_search);
        assert_eq!(total_devices_found, 3);
        assert_eq!(aggregate_summary.total_devices_analyzed, 3);

        // Only id=4321 has a fixture page; the other two are synthesized.
        assert_eq!(devices[0]["device_name"], "Pacemaker, Implantable");
        assert_eq!(devices[0]["data_source"], "live");
        assert_eq!(devices[0]["device_problems"][0]["problem_name"], "Battery Problem");
        assert_eq!(devices[0]["device_problems"][0]["count"], 1520);
        assert_eq!(devices[1]["data_source"], "synthetic");
        assert_eq!(devices[2]["data_source"], "synthetic");
        assert_eq!(browser.open_sessions(), 0);
    }

    #[tokio::test]
    async fn offline_run_is_fully_synthetic_and_reproducible() {
        let browser = FixtureBrowser::offline();
        let settings = Settings::default();
        let a = run(&query(), &browser, &settings).await.unwrap();
        let b = run(&query(), &browser, &settings).await.unwrap();
        assert_eq!(a, b);
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["synthetic_search"], true);
        assert_eq!(v["total_devices_found"], 2);
        assert_eq!(v["search_params"]["product_code"], "DXY");
        assert!(a.devices().iter().all(|d| d["data_source"] == "synthetic"));
        let total: u64 = a
            .devices()
            .iter()
            .map(|d| d["summary"]["total_device_problem_reports"].as_u64().unwrap()
                + d["summary"]["total_patient_problem_reports"].as_u64().unwrap())
            .sum();
        assert_eq!(v["aggregate_summary"]["total_reports_across_devices"], total);
    }

    #[test]
    fn no_devices_shape() {
        let v = serde_json::to_value(ScrapeResponse::NoDevices {
            search_params: query(),
            message: NO_DEVICES_MESSAGE,
            devices: Vec::new(),
        })
        .unwrap();
        assert_eq!(v["message"], NO_DEVICES_MESSAGE);
        assert_eq!(v["devices"], serde_json::json!([]));
        assert_eq!(v["search_params"]["min_year"], 2021);
    }
}
