use std::collections::HashSet;
use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::models::{Extraction, SearchQuery};
use crate::parser::normalize::absolutize;
use crate::session::{Browser, FormMethod, FormSubmission, Session};
use crate::settings::{Settings, ORIGIN};

use super::dom::{attr, attr_contains, is_detail_href, text_of, ANCHOR};
use super::{settle, synthetic};

static FORM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static INPUT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input").unwrap());
static BUTTON: LazyLock<Selector> = LazyLock::new(|| Selector::parse("button").unwrap());
static SELECT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("select").unwrap());
static TEXTAREA: LazyLock<Selector> = LazyLock::new(|| Selector::parse("textarea").unwrap());
static OPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());

const PRODUCT_CODE_FIELD: &str = "productcode";
const YEAR_FIELD: &str = "min_report_year";

/// A form control located on the search page, reduced to what a submission needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub name: String,
    pub value: String,
    /// Option values when the control is a `<select>`.
    pub options: Vec<String>,
}

impl Control {
    fn from_element(el: ElementRef) -> Option<Self> {
        // Browsers never submit a control without a name.
        let name = attr(&el, "name").filter(|n| !n.is_empty())?;
        let value = match el.value().name() {
            "button" => attr(&el, "value").map(str::to_string).unwrap_or_else(|| text_of(el)),
            _ => attr(&el, "value").unwrap_or_default().to_string(),
        };
        let options = el
            .select(&OPTION)
            .map(|o| attr(&o, "value").map(str::to_string).unwrap_or_else(|| text_of(o)))
            .collect();
        Some(Control {
            name: name.to_string(),
            value,
            options,
        })
    }
}

/// One way of finding a control in a parsed page.
pub type Strategy = fn(&Html) -> Option<Control>;

fn first_input_where(doc: &Html, pred: impl Fn(&ElementRef) -> bool) -> Option<Control> {
    doc.select(&INPUT)
        .filter(|el| pred(el))
        .find_map(Control::from_element)
}

fn is_text_input(el: &ElementRef) -> bool {
    match attr(el, "type") {
        None => true,
        Some(t) => matches!(t.to_lowercase().as_str(), "text" | "search"),
    }
}

pub fn device_input_by_name(doc: &Html) -> Option<Control> {
    first_input_where(doc, |el| attr_contains(el, "name", "device"))
}

pub fn device_input_by_id(doc: &Html) -> Option<Control> {
    first_input_where(doc, |el| attr_contains(el, "id", "device"))
}

pub fn device_input_by_placeholder(doc: &Html) -> Option<Control> {
    first_input_where(doc, |el| attr_contains(el, "placeholder", "device"))
}

pub fn any_text_input(doc: &Html) -> Option<Control> {
    first_input_where(doc, is_text_input)
}

/// Device-name input lookups, highest priority first.
pub const DEVICE_INPUT_STRATEGIES: &[Strategy] = &[
    device_input_by_name,
    device_input_by_id,
    device_input_by_placeholder,
    any_text_input,
];

pub fn product_code_input(doc: &Html) -> Option<Control> {
    first_input_where(doc, |el| attr(el, "name") == Some(PRODUCT_CODE_FIELD))
}

pub fn year_select(doc: &Html) -> Option<Control> {
    doc.select(&SELECT)
        .filter(|el| attr(el, "name") == Some(YEAR_FIELD))
        .find_map(Control::from_element)
}

pub fn submit_input(doc: &Html) -> Option<Control> {
    first_input_where(doc, |el| attr_contains(el, "type", "submit")).or_else(|| {
        // Nameless submit inputs still mean "this form has a submit control".
        doc.select(&INPUT)
            .find(|el| attr_contains(el, "type", "submit"))
            .map(|_| Control::anonymous())
    })
}

pub fn submit_button(doc: &Html) -> Option<Control> {
    doc.select(&BUTTON)
        .find(|el| attr_contains(el, "type", "submit"))
        .map(|el| Control::from_element(el).unwrap_or_else(Control::anonymous))
}

pub fn search_value_input(doc: &Html) -> Option<Control> {
    doc.select(&INPUT)
        .find(|el| attr(el, "value").is_some_and(|v| v.contains("Search")))
        .map(|el| Control::from_element(el).unwrap_or_else(Control::anonymous))
}

pub fn search_text_button(doc: &Html) -> Option<Control> {
    doc.select(&BUTTON)
        .find(|el| text_of(*el).contains("Search"))
        .map(|el| Control::from_element(el).unwrap_or_else(Control::anonymous))
}

/// Submission control lookups, highest priority first.
pub const SUBMIT_STRATEGIES: &[Strategy] = &[
    submit_input,
    submit_button,
    search_value_input,
    search_text_button,
];

impl Control {
    /// A control that exists but contributes no field to the submission.
    fn anonymous() -> Self {
        Control {
            name: String::new(),
            value: String::new(),
            options: Vec::new(),
        }
    }
}

/// First hit across `strategies`, in order.
pub fn locate(doc: &Html, strategies: &[Strategy]) -> Option<Control> {
    strategies.iter().find_map(|s| s(doc))
}

/// The form that owns a field called `field`, else the page's first form.
fn owning_form<'a>(doc: &'a Html, field: &str) -> Option<ElementRef<'a>> {
    let owns = |form: &ElementRef| {
        form.select(&INPUT)
            .chain(form.select(&TEXTAREA))
            .any(|el| attr(&el, "name") == Some(field))
    };
    doc.select(&FORM)
        .find(|f| owns(f))
        .or_else(|| doc.select(&FORM).next())
}

/// A form's resolved action, method and default field values.
pub fn default_submission(form: ElementRef, page_url: &str) -> Result<FormSubmission, ScrapeError> {
    let base = Url::parse(page_url).map_err(|e| ScrapeError::BadUrl {
        url: page_url.to_string(),
        reason: e.to_string(),
    })?;
    let action_attr = attr(&form, "action").unwrap_or("");
    let action = base.join(action_attr).map_err(|e| ScrapeError::BadUrl {
        url: action_attr.to_string(),
        reason: e.to_string(),
    })?;
    let method = match attr(&form, "method").map(str::to_lowercase).as_deref() {
        Some("post") => FormMethod::Post,
        _ => FormMethod::Get,
    };

    let mut fields = Vec::new();
    for input in form.select(&INPUT) {
        let Some(name) = attr(&input, "name") else { continue };
        let kind = attr(&input, "type").unwrap_or("text").to_lowercase();
        let checked = input.value().attr("checked").is_some();
        match kind.as_str() {
            "submit" | "button" | "image" | "reset" | "file" => {}
            "checkbox" | "radio" if !checked => {}
            "checkbox" | "radio" => fields.push((
                name.to_string(),
                attr(&input, "value").unwrap_or("on").to_string(),
            )),
            _ => fields.push((name.to_string(), attr(&input, "value").unwrap_or("").to_string())),
        }
    }
    for select in form.select(&SELECT) {
        let Some(name) = attr(&select, "name") else { continue };
        let chosen = select
            .select(&OPTION)
            .find(|o| o.value().attr("selected").is_some())
            .or_else(|| select.select(&OPTION).next());
        if let Some(option) = chosen {
            let value = attr(&option, "value").map(str::to_string).unwrap_or_else(|| text_of(option));
            fields.push((name.to_string(), value));
        }
    }
    for area in form.select(&TEXTAREA) {
        if let Some(name) = attr(&area, "name") {
            fields.push((name.to_string(), text_of(area)));
        }
    }

    Ok(FormSubmission {
        action: action.to_string(),
        method,
        fields,
    })
}

/// Fill the search form on `page_html` for `query`.
pub fn fill_search_form(
    page_html: &str,
    page_url: &str,
    query: &SearchQuery,
) -> Result<FormSubmission, ScrapeError> {
    let doc = Html::parse_document(page_html);
    if doc.select(&FORM).next().is_none() {
        return Err(ScrapeError::NoForm(page_url.to_string()));
    }

    info!("Filling search form with device_name: {}", query.device_name);
    let device_input = locate(&doc, DEVICE_INPUT_STRATEGIES).ok_or(ScrapeError::NoInputControl)?;
    let owner = owning_form(&doc, &device_input.name)
        .ok_or_else(|| ScrapeError::NoForm(page_url.to_string()))?;
    let mut form = default_submission(owner, page_url)?;
    form.set(&device_input.name, &query.device_name);
    info!("Device name entered into '{}'", device_input.name);

    // Remaining controls are looked up inside the chosen form only.
    let scope = Html::parse_fragment(&owner.html());

    let year = query.min_year.to_string();
    match year_select(&scope) {
        Some(select) if select.options.contains(&year) => {
            form.set(&select.name, &year);
            info!("Min year set to {}", year);
        }
        Some(_) => warn!("Year selector has no option {}, continuing without year filter", year),
        None => warn!("Year selector not found, continuing without year filter"),
    }

    if let Some(code) = &query.product_code {
        match product_code_input(&scope) {
            Some(input) => {
                form.set(&input.name, code);
                info!("Product code {} entered", code);
            }
            None => warn!("Product code field not found"),
        }
    }

    match locate(&scope, SUBMIT_STRATEGIES) {
        Some(submit) if !submit.name.is_empty() => {
            form.set(&submit.name, &submit.value);
            info!("Search form submitted via '{}'", submit.name);
        }
        Some(_) => info!("Search form submitted"),
        None => info!("Form submitted directly"),
    }

    Ok(form)
}

/// Detail-page links on a results page, absolute and de-duplicated in
/// first-seen order.
pub fn extract_detail_links(html: &str, settings: &Settings) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for a in doc.select(&ANCHOR) {
        let Some(href) = attr(&a, "href") else { continue };
        let href = href.trim();
        if !is_detail_href(href) {
            continue;
        }
        let full = absolutize(href, ORIGIN, &settings.tplc_base);
        if seen.insert(full.clone()) {
            links.push(full);
        }
    }
    links
}

async fn drive<S: Session>(
    session: &mut S,
    query: &SearchQuery,
    settings: &Settings,
) -> Result<Vec<String>, ScrapeError> {
    info!("Navigating to FDA TPLC search page");
    let page = session.goto(&settings.search_url).await?;
    let form = fill_search_form(&page.html, &page.url, query)?;
    let results = session.submit(&form).await?;

    settle(settings).await;

    let links = extract_detail_links(&results.html, settings);
    if links.is_empty() {
        return Err(ScrapeError::NoResults);
    }
    Ok(links)
}

/// Run one search. Never fails: when the live search can't produce links,
/// synthetic candidates are returned instead.
pub async fn search<B: Browser>(
    browser: &B,
    query: &SearchQuery,
    settings: &Settings,
) -> Extraction<Vec<String>> {
    let outcome = match browser.open().await {
        Ok(mut session) => {
            let outcome = drive(&mut session, query, settings).await;
            session.close();
            outcome
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(links) => {
            info!("Found {} device links", links.len());
            Extraction::Real(links)
        }
        Err(e) => {
            warn!("Error during device search ({}), using synthetic links", e);
            Extraction::Synthetic(synthetic::search_links(query, settings))
        }
    }
}
