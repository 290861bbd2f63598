use tracing::{error, info};

use crate::error::ParseError;
use crate::models::{
    CleanProblem, DataSource, DeviceRecord, DeviceSummary, ProblemType, RawDeviceData, SafetyNote,
};

use super::normalize::clean_name;
use super::problems::clean_problems;

/// Parse one extracted device. Never fails: internal errors yield a
/// "Parse Error" record carrying the message.
pub fn parse(raw: &RawDeviceData) -> DeviceRecord {
    match try_parse(raw) {
        Ok(record) => record,
        Err(e) => {
            error!("Error parsing device data from {}: {}", raw.url, e);
            DeviceRecord::degraded(raw.url.clone(), e.to_string())
        }
    }
}

/// Same as [`parse`] for untyped input, e.g. records loaded from JSON.
pub fn parse_value(raw: &serde_json::Value) -> DeviceRecord {
    match serde_json::from_value::<RawDeviceData>(raw.clone()) {
        Ok(data) => parse(&data),
        Err(e) => {
            let e = ParseError::from(e);
            error!("Error parsing device data: {}", e);
            let url = raw
                .get("url")
                .and_then(|u| u.as_str())
                .unwrap_or_default()
                .to_string();
            DeviceRecord::degraded(url, e.to_string())
        }
    }
}

fn try_parse(raw: &RawDeviceData) -> Result<DeviceRecord, ParseError> {
    let device_name = clean_name(&raw.device_name);
    let device_problems = clean_problems(&raw.device_problems, ProblemType::Device);
    let patient_problems = clean_problems(&raw.patient_problems, ProblemType::Patient);

    let summary = summarize(&device_name, &device_problems, &patient_problems)?;

    info!(
        "Parsed device: {} with {} device problems and {} patient problems",
        device_name,
        device_problems.len(),
        patient_problems.len()
    );

    Ok(DeviceRecord {
        device_name,
        device_url: raw.url.clone(),
        total_device_problems: device_problems.len(),
        total_patient_problems: patient_problems.len(),
        device_problems,
        patient_problems,
        summary: Some(summary),
        error: None,
        data_source: DataSource::Live,
    })
}

fn total_reports(device_name: &str, problems: &[CleanProblem]) -> Result<u64, ParseError> {
    problems
        .iter()
        .try_fold(0u64, |acc, p| acc.checked_add(p.count))
        .ok_or_else(|| ParseError::CountOverflow(device_name.to_string()))
}

fn summarize(
    device_name: &str,
    device_problems: &[CleanProblem],
    patient_problems: &[CleanProblem],
) -> Result<DeviceSummary, ParseError> {
    let device_reports = total_reports(device_name, device_problems)?;
    let patient_reports = total_reports(device_name, patient_problems)?;
    let combined = device_reports
        .checked_add(patient_reports)
        .ok_or_else(|| ParseError::CountOverflow(device_name.to_string()))?;

    Ok(DeviceSummary {
        device_name: device_name.to_string(),
        total_device_problem_reports: device_reports,
        total_patient_problem_reports: patient_reports,
        total_problems_tracked: device_problems.len() + patient_problems.len(),
        most_common_device_problem: device_problems.first().map(|p| p.problem_name.clone()),
        most_common_patient_problem: patient_problems.first().map(|p| p.problem_name.clone()),
        safety_note: SafetyNote::from_total(combined),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawCount, RawProblemEntry};
    use serde_json::json;

    fn problem(name: &str, count: i64) -> RawProblemEntry {
        RawProblemEntry {
            problem_name: name.to_string(),
            count: Some(RawCount::Int(count)),
            ..Default::default()
        }
    }

    fn with_total(device: i64, patient: i64) -> DeviceRecord {
        parse(&RawDeviceData {
            url: "u".into(),
            device_name: "Pump".into(),
            device_problems: vec![problem("Leak", device)],
            patient_problems: vec![problem("Burn", patient)],
        })
    }

    #[test]
    fn leak_scenario() {
        let raw: RawDeviceData = serde_json::from_value(json!({
            "device_name": " Device: Foo ",
            "device_problems": [
                {"problem_name": "leak", "count": "12 reports"},
                {"problem_name": "n/a", "count": 5}
            ],
            "patient_problems": []
        }))
        .unwrap();
        let rec = parse(&raw);
        assert_eq!(rec.device_name, "Foo");
        assert_eq!(rec.device_problems.len(), 1);
        let p = &rec.device_problems[0];
        assert_eq!(p.problem_name, "Leak");
        assert_eq!(p.count, 12);
        assert_eq!(p.problem_type, ProblemType::Device);
        assert!(rec.patient_problems.is_empty());
        assert_eq!(rec.total_device_problems, 1);
        assert_eq!(rec.total_patient_problems, 0);
        let s = rec.summary.unwrap();
        assert_eq!(s.safety_note, SafetyNote::Low);
        assert_eq!(s.most_common_device_problem.as_deref(), Some("Leak"));
        assert_eq!(s.most_common_patient_problem, None);
    }

    #[test]
    fn safety_note_thresholds() {
        let note = |d, p| with_total(d, p).summary.unwrap().safety_note;
        assert_eq!(note(60, 40), SafetyNote::Moderate);
        assert_eq!(note(60, 41), SafetyNote::High);
        assert_eq!(note(10, 10), SafetyNote::Low);
        assert_eq!(note(10, 11), SafetyNote::Moderate);
    }

    #[test]
    fn summary_totals_and_most_common() {
        let rec = parse(&RawDeviceData {
            url: "u".into(),
            device_name: "Pump".into(),
            device_problems: vec![problem("Beta", 3), problem("Alpha", 3), problem("Gamma", 9)],
            patient_problems: vec![problem("Rash", 1), problem("Fever", 4)],
        });
        let s = rec.summary.unwrap();
        assert_eq!(s.total_device_problem_reports, 15);
        assert_eq!(s.total_patient_problem_reports, 5);
        assert_eq!(s.total_problems_tracked, 5);
        assert_eq!(s.most_common_device_problem.as_deref(), Some("Gamma"));
        assert_eq!(s.most_common_patient_problem.as_deref(), Some("Fever"));
        assert_eq!(rec.device_problems[1].problem_name, "Alpha");
    }

    #[test]
    fn blank_name_becomes_placeholder() {
        let rec = parse(&RawDeviceData::default());
        assert_eq!(rec.device_name, "Unknown Device");
        assert!(!rec.is_degraded());
    }

    #[test]
    fn overflow_degrades() {
        let rec = parse(&RawDeviceData {
            url: "https://x/tplc.cfm?id=1".into(),
            device_name: "Pump".into(),
            device_problems: vec![
                RawProblemEntry {
                    problem_name: "A".into(),
                    count: Some(RawCount::Text("99999999999999999999999".into())),
                    ..Default::default()
                },
                problem("B", 1),
            ],
            patient_problems: vec![],
        });
        assert!(rec.is_degraded());
        assert_eq!(rec.device_name, "Parse Error");
        assert_eq!(rec.device_url, "https://x/tplc.cfm?id=1");
        assert!(rec.device_problems.is_empty());
        assert_eq!(rec.total_device_problems, 0);
    }

    #[test]
    fn counts_beyond_i64_are_kept() {
        let big = i64::MAX as u64 + 10;
        let rec = parse_value(&json!({
            "device_name": "Pump",
            "device_problems": [{"problem_name": "Leak", "count": big}]
        }));
        assert_eq!(rec.device_problems[0].count, big);
        assert_eq!(rec.summary.unwrap().safety_note, SafetyNote::High);
    }

    #[test]
    fn malformed_value_degrades_and_keeps_url() {
        let rec = parse_value(&json!({"url": "https://x/1", "device_problems": "oops"}));
        assert_eq!(rec.device_name, "Parse Error");
        assert_eq!(rec.device_url, "https://x/1");
        assert!(rec.error.unwrap().contains("malformed"));

        let rec = parse_value(&json!(42));
        assert_eq!(rec.device_url, "");
    }
}
