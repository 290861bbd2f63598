use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::models::RawCount;
use crate::settings::{MAUDE_BASE, ORIGIN};

pub const UNKNOWN_DEVICE: &str = "Unknown Device";

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NAME_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(Device:|Product:|Name:)\s*").unwrap());
static PROBLEM_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(Problem:|Issue:|Type:)\s*").unwrap());
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

fn collapse_ws(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").into_owned()
}

pub fn clean_name(raw: &str) -> String {
    if raw.trim().is_empty() {
        return UNKNOWN_DEVICE.to_string();
    }
    let collapsed = collapse_ws(raw);
    NAME_LABEL_RE.replace(&collapsed, "").into_owned()
}

pub fn clean_problem_name(raw: &str) -> String {
    let collapsed = collapse_ws(raw);
    let cleaned = PROBLEM_LABEL_RE.replace(&collapsed, "").into_owned();
    if is_all_lower(&cleaned) {
        title_case(&cleaned)
    } else {
        cleaned
    }
}

/// True when there is at least one cased char and none of them are upper-case.
fn is_all_lower(s: &str) -> bool {
    s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase)
}

/// Upper-cases the first letter of every alphabetic run ("o'neil-leak" -> "O'Neil-Leak").
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() && !prev_alpha {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// First run of ASCII digits in `s`, saturating on overflow.
pub fn first_digit_run(s: &str) -> Option<u64> {
    DIGITS_RE
        .find(s)
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
}

pub fn clean_count(raw: Option<&RawCount>) -> u64 {
    match raw {
        Some(RawCount::Int(n)) => (*n).max(0) as u64,
        Some(RawCount::UInt(n)) => *n,
        Some(RawCount::Text(s)) => first_digit_run(s).unwrap_or(0),
        Some(RawCount::Other(_)) | None => 0,
    }
}

/// Makes `link` absolute against `origin` (root-relative) or `base` (anything else).
pub fn absolutize(link: &str, origin: &str, base: &str) -> String {
    if link.starts_with("http") {
        link.to_string()
    } else if link.starts_with('/') {
        format!("{}{}", origin, link)
    } else {
        format!("{}{}", base, link)
    }
}

pub fn clean_link(raw: &str) -> String {
    let link = raw.trim();
    if link.is_empty() {
        return String::new();
    }
    let link = absolutize(link, ORIGIN, MAUDE_BASE);
    if !link.to_lowercase().contains("maude") {
        warn!("Link doesn't appear to be a MAUDE link: {}", link);
    }
    link
}
