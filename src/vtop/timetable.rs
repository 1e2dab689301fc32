//! Timetable scraping for an authenticated session.

use chrono::Datelike;
use html_scraper::Html;
use serde::Serialize;
use std::fmt;
use tracing::{info, instrument};

use crate::vtop::cookies::CookieMap;
use crate::vtop::errors::Result;
use crate::vtop::extract::{TableRow, extract_table};
use crate::vtop::portal::Portal;

const TIMETABLE_PATH: &str = "/vtop/academics/student/timetable";

/// Half of the academic year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Semester {
    /// July through December.
    #[serde(rename = "FS")]
    Fall,
    /// January through June.
    #[serde(rename = "WS")]
    Winter,
}

impl Semester {
    /// `month` is 1-based.
    pub fn for_month(month: u32) -> Self {
        if (7..=12).contains(&month) {
            Self::Fall
        } else {
            Self::Winter
        }
    }

    pub fn current() -> Self {
        Self::for_month(chrono::Local::now().month())
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Fall => "FS",
            Self::Winter => "WS",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Portal {
    pub fn default_timetable_url(&self) -> String {
        format!("{}{TIMETABLE_PATH}", self.base_url)
    }

    /// Fetch the timetable page with `cookies` and return its first table.
    ///
    /// A relative `url` resolves against the portal host; it defaults to the
    /// student timetable page.
    #[instrument(skip_all)]
    pub async fn timetable(&self, cookies: CookieMap, url: Option<&str>) -> Result<Vec<TableRow>> {
        let target = match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Portal::resolve(&self.login_page_url, url)?,
            None => Portal::resolve(&self.login_page_url, &self.default_timetable_url())?,
        };

        let mut session = self.session(cookies);
        let page = session.get_page(&target, self.timetable_timeout).await?;

        let doc = Html::parse_document(&page.text());
        let rows = extract_table(&doc)?;
        info!(url = %page.url, rows = rows.len(), "timetable extracted");
        Ok(rows)
    }
}
