//! Heuristic extraction of login form, captcha and data tables from portal HTML.
//!
//! The portal's markup varies across campuses and changes without notice, so
//! the captcha lookup is driven by an ordered list of matchers that can be
//! replaced from configuration. Everything here is a pure function of the
//! parsed document.

use html_scraper::{ElementRef, Html, Selector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::vtop::errors::{Result, VtopError};

static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static FORM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static INPUT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input").unwrap());
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// One row of an extracted table: column label → cell text.
pub type TableRow = IndexMap<String, String>;

/// A predicate identifying the captcha `<img>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaMatcher {
    /// Exact `id` attribute.
    Id(String),
    /// Attribute value containing `needle`, ignoring ASCII case.
    AttrContains { attr: String, needle: String },
}

impl CaptchaMatcher {
    fn matches(&self, el: &ElementRef<'_>) -> bool {
        match self {
            Self::Id(id) => el.value().id() == Some(id.as_str()),
            Self::AttrContains { attr, needle } => el
                .attr(attr)
                .is_some_and(|v| v.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())),
        }
    }
}

/// Captcha matchers in priority order; the first one that hits wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptchaMatchers(pub Vec<CaptchaMatcher>);

impl Default for CaptchaMatchers {
    fn default() -> Self {
        Self(vec![
            CaptchaMatcher::Id("imgCaptcha".to_string()),
            CaptchaMatcher::Id("captcha".to_string()),
            CaptchaMatcher::AttrContains {
                attr: "src".to_string(),
                needle: "captcha".to_string(),
            },
            CaptchaMatcher::AttrContains {
                attr: "id".to_string(),
                needle: "captcha".to_string(),
            },
        ])
    }
}

/// The first `<form>` of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub action: Option<String>,
    /// Input name → default value, in document order.
    pub fields: IndexMap<String, String>,
}

/// `src` of the captcha image, if the page has one.
pub fn find_captcha_src(doc: &Html, matchers: &CaptchaMatchers) -> Option<String> {
    let images: Vec<ElementRef<'_>> = doc
        .select(&IMG)
        .filter(|img| img.attr("src").is_some_and(|src| !src.trim().is_empty()))
        .collect();

    matchers.0.iter().find_map(|matcher| {
        images
            .iter()
            .find(|img| matcher.matches(img))
            .and_then(|img| img.attr("src"))
            .map(|src| src.trim().to_string())
    })
}

pub fn find_login_form(doc: &Html) -> Option<LoginForm> {
    let form = doc.select(&FORM).next()?;
    let action = form
        .attr("action")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    let mut fields = IndexMap::new();
    for input in form.select(&INPUT) {
        let Some(name) = input.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        fields.insert(
            name.to_string(),
            input.attr("value").unwrap_or_default().to_string(),
        );
    }

    Some(LoginForm { action, fields })
}

/// Rows of the first `<table>` in the document.
///
/// Header labels are all `<th>` cells of the table. A row whose cell count
/// equals the header count is keyed by header; any other row is keyed
/// `col1..colN`.
pub fn extract_table(doc: &Html) -> Result<Vec<TableRow>> {
    let table = doc.select(&TABLE).next().ok_or_else(|| {
        VtopError::NotFound(
            "No table found; verify you are logged in and URL is correct".to_string(),
        )
    })?;

    let headers: Vec<String> = table.select(&TH).map(cell_text).collect();

    let rows = table
        .select(&TR)
        .filter_map(|tr| {
            let values: Vec<String> = tr.select(&TD).map(cell_text).collect();
            if values.is_empty() {
                return None;
            }
            let row: TableRow = if !headers.is_empty() && values.len() == headers.len() {
                headers.iter().cloned().zip(values).collect()
            } else {
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (format!("col{}", i + 1), v))
                    .collect()
            };
            Some(row)
        })
        .collect();

    Ok(rows)
}

/// Text fragments of a cell, each trimmed, concatenated.
fn cell_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).filter(|t| !t.is_empty()).collect()
}
