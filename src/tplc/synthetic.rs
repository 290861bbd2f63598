//! Deterministic stand-in data used when the live source cannot be read.
//!
//! Everything here is a pure function of its inputs so repeated requests for
//! the same search or URL produce identical output.

use sha2::{Digest, Sha256};

use crate::models::{RawCount, RawDeviceData, RawProblemEntry, RawProblemKind, SearchQuery};
use crate::settings::{Settings, MAUDE_BASE};

use super::dom::detail_id;

pub const DEFAULT_DEVICE_ID: u64 = 1234;
pub const SYNTHETIC_LINK_COUNT: usize = 2;

const DEVICE_NAMES: &[&str] = &[
    "Infusion Pump System",
    "Implantable Cardiac Pacemaker",
    "Insulin Delivery Pump",
    "Surgical Stapler",
    "Blood Glucose Monitoring System",
    "Coronary Drug-Eluting Stent",
];

const DEVICE_PROBLEMS: &[&str] = &[
    "Adverse Event Without Identified Device or Use Problem",
    "Battery Problem",
    "Break",
    "Device Alarm System",
    "Fluid Leak",
    "Insufficient Information",
    "Material Deformation",
    "Occlusion Within Device",
    "Power Problem",
    "Unintended Movement",
];

const PATIENT_PROBLEMS: &[&str] = &[
    "Bleeding",
    "Burn(s)",
    "Death",
    "Hypoglycemia",
    "Infection",
    "Insufficient Information",
    "No Clinical Signs, Symptoms or Conditions",
    "Pain",
];

fn hash_u64(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Candidate detail URLs derived from the device name and year.
pub fn search_links(query: &SearchQuery, settings: &Settings) -> Vec<String> {
    let h = hash_u64(&format!("{}:{}", query.device_name, query.min_year));
    let first = 1000 + h % 9000;
    let mut second = 1000 + (h >> 20) % 9000;
    if second == first {
        second = 1000 + (first - 999) % 9000;
    }

    let ids: [u64; SYNTHETIC_LINK_COUNT] = [first, second];
    ids.iter()
        .map(|id| {
            format!(
                "{}tplc.cfm?id={}&min_report_year={}",
                settings.tplc_base, id, query.min_year
            )
        })
        .collect()
}

/// How one problem list is drawn from its catalog.
struct Draw {
    catalog: &'static [&'static str],
    len: u64,
    start: u64,
    salt: u64,
    modulo: u64,
    kind: RawProblemKind,
}

impl Draw {
    fn entries(&self, id: u64) -> Vec<RawProblemEntry> {
        (0..self.len)
            .map(|i| {
                let idx = ((self.start + i) % self.catalog.len() as u64) as usize;
                let count = id.wrapping_mul(i + self.salt) % self.modulo + 1;
                RawProblemEntry {
                    problem_name: self.catalog[idx].to_string(),
                    count: Some(RawCount::Int(count as i64)),
                    maude_link: Some(format!(
                        "{}results.cfm?productproblem={}&devid={}",
                        MAUDE_BASE,
                        idx + 1,
                        id
                    )),
                    kind: self.kind,
                }
            })
            .collect()
    }
}

/// Fabricated detail page for `url`, keyed off its `id=` parameter.
pub fn device_record(url: &str) -> RawDeviceData {
    let id = detail_id(url).unwrap_or(DEFAULT_DEVICE_ID);
    let name = DEVICE_NAMES[(id % DEVICE_NAMES.len() as u64) as usize];

    let device = Draw {
        catalog: DEVICE_PROBLEMS,
        len: 2 + id % 3,
        start: id % DEVICE_PROBLEMS.len() as u64,
        salt: 7,
        modulo: 150,
        kind: RawProblemKind::Device,
    };
    let patient = Draw {
        catalog: PATIENT_PROBLEMS,
        len: 1 + (id / 3) % 3,
        start: (id / 7) % PATIENT_PROBLEMS.len() as u64,
        salt: 3,
        modulo: 40,
        kind: RawProblemKind::Patient,
    };

    RawDeviceData {
        url: url.to_string(),
        device_name: name.to_string(),
        device_problems: device.entries(id),
        patient_problems: patient.entries(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(name: &str, year: i32) -> SearchQuery {
        SearchQuery::new(name, None, year).unwrap()
    }

    #[test]
    fn links_are_deterministic() {
        let s = Settings::default();
        let a = search_links(&query("pacemaker", 2021), &s);
        let b = search_links(&query("pacemaker", 2021), &s);
        assert_eq!(a, b);
        assert_eq!(a.len(), SYNTHETIC_LINK_COUNT);
        assert_ne!(a[0], a[1]);
        assert!(a.iter().all(|l| detail_id(l).is_some()));
    }

    #[test]
    fn links_depend_on_name_and_year() {
        let s = Settings::default();
        let base = search_links(&query("pacemaker", 2021), &s);
        assert_ne!(base, search_links(&query("pacemaker", 2022), &s));
        assert_ne!(base, search_links(&query("syringe", 2021), &s));
    }

    #[test]
    fn default_id_record() {
        let url = "https://example.org/no-id-here";
        let a = device_record(url);
        assert_eq!(a, device_record(url));
        assert_eq!(a.url, url);
        // 1234 % 6 == 4
        assert_eq!(a.device_name, "Blood Glucose Monitoring System");
        assert_eq!(a.device_problems.len(), 3);
        assert_eq!(a.patient_problems.len(), 1);
        let explicit = device_record("https://x/tplc.cfm?id=1234");
        assert_eq!(explicit.device_name, a.device_name);
        assert_eq!(explicit.device_problems, a.device_problems);
    }

    #[test]
    fn maude_links_are_unchanged_by_cleaning() {
        let rec = device_record("https://x/tplc.cfm?id=4321");
        for p in rec.device_problems.iter().chain(&rec.patient_problems) {
            let link = p.maude_link.as_deref().unwrap();
            assert!(link.starts_with(MAUDE_BASE));
            assert_eq!(crate::parser::normalize::clean_link(link), link);
        }
    }

    #[test]
    fn sizes_stay_in_range() {
        for id in 0..60u64 {
            let rec = device_record(&format!("https://x/tplc.cfm?id={id}"));
            assert!((2..=4).contains(&rec.device_problems.len()));
            assert!((1..=3).contains(&rec.patient_problems.len()));
            for p in rec.device_problems.iter().chain(&rec.patient_problems) {
                assert!(p.maude_link.as_deref().unwrap().contains("cfmaude"));
                assert!(matches!(p.count, Some(RawCount::Int(c)) if c >= 1));
            }
        }
    }
}
