//! The configured portal client.

use anyhow::Context;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::vtop::cookies::CookieMap;
use crate::vtop::errors::{Result, VtopError};
use crate::vtop::extract::CaptchaMatchers;
use crate::vtop::login::{FormFieldNames, LoginMarkers};
use crate::vtop::session::{Session, build_client};

/// Entry point for every portal operation.
///
/// Holds configuration and a shared HTTP client only; all session state
/// lives in the [`Session`] values handed out per operation.
pub struct Portal {
    pub(crate) http: reqwest::Client,
    pub(crate) login_page_url: Url,
    pub(crate) base_url: String,
    pub(crate) fallback_action: String,
    pub(crate) page_timeout: Duration,
    pub(crate) submit_timeout: Duration,
    pub(crate) timetable_timeout: Duration,
    pub(crate) fields: FormFieldNames,
    pub(crate) markers: LoginMarkers,
    pub(crate) captcha_matchers: CaptchaMatchers,
}

impl Portal {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let login_page_url = Url::parse(&config.login_page_url)
            .with_context(|| format!("Invalid login page URL '{}'", config.login_page_url))?;
        Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL '{}'", config.base_url))?;

        let http = build_client(&config.user_agent, config.accept_invalid_certs)
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            login_page_url,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            fallback_action: config.fallback_action.clone(),
            page_timeout: config.page_timeout,
            submit_timeout: config.submit_timeout,
            timetable_timeout: config.timetable_timeout,
            fields: config.fields.clone(),
            markers: config.markers.clone(),
            captcha_matchers: config.captcha_matchers.clone(),
        })
    }

    pub fn login_page_url(&self) -> &Url {
        &self.login_page_url
    }

    /// A session carrying `cookies`.
    pub fn session(&self, cookies: CookieMap) -> Session {
        Session::new(self.http.clone(), cookies)
    }

    /// Resolve a possibly relative reference against `base`.
    pub(crate) fn resolve(base: &Url, reference: &str) -> Result<Url> {
        base.join(reference.trim())
            .map_err(|source| VtopError::InvalidUrl {
                input: reference.to_string(),
                source,
            })
    }
}
