use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

pub static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

static DETAIL_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)[?&]id=(\d+)").unwrap());
static DETAIL_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)[?&]id=[^&#]+").unwrap());

/// Concatenated text of an element and its descendants, trimmed.
pub fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

pub fn attr<'a>(el: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name)
}

/// Case-insensitive attribute substring test.
pub fn attr_contains(el: &ElementRef, name: &str, needle: &str) -> bool {
    attr(el, name).is_some_and(|v| v.to_lowercase().contains(needle))
}

/// Does `href` point at a TPLC detail page carrying an id parameter?
pub fn is_detail_href(href: &str) -> bool {
    href.to_lowercase().contains("tplc.cfm") && DETAIL_PARAM_RE.is_match(href)
}

/// Numeric `id=` value from a detail URL.
pub fn detail_id(url: &str) -> Option<u64> {
    DETAIL_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
