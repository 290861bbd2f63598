use serde_json::Value;
use tracing::{error, info};

use crate::models::{AggregateResponse, AggregateSummary};

const REQUIRED_FIELDS: &[&str] = &["device_name", "device_url", "device_problems", "patient_problems"];
const REQUIRED_PROBLEM_FIELDS: &[&str] = &["problem_name", "count", "maude_link"];

/// Structural check on one parsed device mapping.
pub fn validate(record: &Value) -> bool {
    for field in REQUIRED_FIELDS {
        if record.get(field).is_none() {
            error!("Missing required field: {}", field);
            return false;
        }
    }

    for list in [&record["device_problems"], &record["patient_problems"]] {
        let Some(problems) = list.as_array() else {
            error!("Problems must be lists");
            return false;
        };
        for problem in problems {
            let Some(map) = problem.as_object() else {
                error!("Each problem must be a mapping");
                return false;
            };
            if let Some(missing) = REQUIRED_PROBLEM_FIELDS.iter().find(|f| !map.contains_key(**f)) {
                error!("Missing problem field: {}", missing);
                return false;
            }
        }
    }
    true
}

fn list_len(record: &Value, field: &str) -> usize {
    record[field].as_array().map_or(0, Vec::len)
}

fn list_reports(record: &Value, field: &str) -> u64 {
    record[field]
        .as_array()
        .map(|ps| ps.iter().filter_map(|p| p["count"].as_u64()).fold(0u64, u64::saturating_add))
        .unwrap_or(0)
}

/// Keep only valid records and total them up. Invalid ones are dropped silently.
pub fn format(records: impl IntoIterator<Item = Value>) -> AggregateResponse {
    let devices: Vec<Value> = records.into_iter().filter(validate).collect();

    let summary = AggregateSummary {
        total_devices_analyzed: devices.len(),
        total_device_problem_types: devices.iter().map(|d| list_len(d, "device_problems")).sum(),
        total_patient_problem_types: devices.iter().map(|d| list_len(d, "patient_problems")).sum(),
        total_reports_across_devices: devices
            .iter()
            .map(|d| {
                list_reports(d, "device_problems").saturating_add(list_reports(d, "patient_problems"))
            })
            .fold(0u64, u64::saturating_add),
    };

    info!(
        "Aggregated {} devices ({} reports)",
        summary.total_devices_analyzed, summary.total_reports_across_devices
    );

    AggregateResponse {
        devices,
        aggregate_summary: summary,
    }
}
