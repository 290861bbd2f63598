use serde::{Deserialize, Serialize};

use crate::error::QueryError;

pub const MIN_YEAR_FLOOR: i32 = 2000;
pub const MIN_YEAR_CEILING: i32 = 2024;
pub const DEFAULT_MIN_YEAR: i32 = 2020;

/// Validated search input. Built once per request and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub device_name: String,
    pub product_code: Option<String>,
    pub min_year: i32,
}

impl SearchQuery {
    pub fn new(
        device_name: impl Into<String>,
        product_code: Option<String>,
        min_year: i32,
    ) -> Result<Self, QueryError> {
        let device_name = device_name.into();
        if device_name.trim().is_empty() {
            return Err(QueryError::EmptyDeviceName);
        }
        if !(MIN_YEAR_FLOOR..=MIN_YEAR_CEILING).contains(&min_year) {
            return Err(QueryError::YearOutOfRange(min_year));
        }
        // Blank product codes are treated as "no filter".
        let product_code = product_code.filter(|c| !c.trim().is_empty());
        Ok(SearchQuery {
            device_name,
            product_code,
            min_year,
        })
    }
}

/// Count as scraped: an integer, free text like "12 reports", or anything else.
/// `UInt` only catches integers too large for `i64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Int(i64),
    UInt(u64),
    Text(String),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawProblemKind {
    Device,
    Patient,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawProblemEntry {
    #[serde(default)]
    pub problem_name: String,
    #[serde(default)]
    pub count: Option<RawCount>,
    #[serde(default)]
    pub maude_link: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: RawProblemKind,
}

/// One detail page as extracted, before any cleaning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDeviceData {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub device_problems: Vec<RawProblemEntry>,
    #[serde(default)]
    pub patient_problems: Vec<RawProblemEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Device,
    Patient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanProblem {
    pub problem_name: String,
    pub count: u64,
    pub maude_link: String,
    pub problem_type: ProblemType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SafetyNote {
    #[serde(rename = "High number of reported problems - review recommended")]
    High,
    #[serde(rename = "Moderate number of reported problems")]
    Moderate,
    #[serde(rename = "Low number of reported problems")]
    Low,
}

impl SafetyNote {
    pub fn from_total(total_reports: u64) -> Self {
        if total_reports > 100 {
            SafetyNote::High
        } else if total_reports > 20 {
            SafetyNote::Moderate
        } else {
            SafetyNote::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub device_name: String,
    pub total_device_problem_reports: u64,
    pub total_patient_problem_reports: u64,
    pub total_problems_tracked: usize,
    pub most_common_device_problem: Option<String>,
    pub most_common_patient_problem: Option<String>,
    pub safety_note: SafetyNote,
}

/// Where a record's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Live,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub device_name: String,
    pub device_url: String,
    pub device_problems: Vec<CleanProblem>,
    pub patient_problems: Vec<CleanProblem>,
    pub total_device_problems: usize,
    pub total_patient_problems: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DeviceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data_source: DataSource,
}

impl DeviceRecord {
    /// Minimal record returned when parsing fails.
    pub fn degraded(device_url: String, error: String) -> Self {
        DeviceRecord {
            device_name: "Parse Error".to_string(),
            device_url,
            device_problems: Vec::new(),
            patient_problems: Vec::new(),
            total_device_problems: 0,
            total_patient_problems: 0,
            summary: None,
            error: Some(error),
            data_source: DataSource::Live,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub total_devices_analyzed: usize,
    pub total_device_problem_types: usize,
    pub total_patient_problem_types: usize,
    pub total_reports_across_devices: u64,
}

/// Merged output of the formatter. Devices stay as JSON mappings because
/// validation is structural.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResponse {
    pub devices: Vec<serde_json::Value>,
    pub aggregate_summary: AggregateSummary,
}

/// Tags a navigator/extractor result with whether it came from the live
/// source or was fabricated after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    Real(T),
    Synthetic(T),
}

impl<T> Extraction<T> {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Extraction::Synthetic(_))
    }

    pub fn source(&self) -> DataSource {
        match self {
            Extraction::Real(_) => DataSource::Live,
            Extraction::Synthetic(_) => DataSource::Synthetic,
        }
    }

    pub fn get(&self) -> &T {
        match self {
            Extraction::Real(v) | Extraction::Synthetic(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Extraction::Real(v) | Extraction::Synthetic(v) => v,
        }
    }
}
