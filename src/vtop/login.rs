//! Two-phase login: open the login page and captcha, then submit credentials.
//!
//! The service splits the phases across two requests, carrying the session in
//! a cookie token; the interactive command runs both on one [`Session`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use html_scraper::Html;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::utils::log_if_slow;
use crate::vtop::cookies::CookieMap;
use crate::vtop::errors::{AuthFailure, Result, VtopError};
use crate::vtop::extract::{LoginForm, find_captcha_src, find_login_form};
use crate::vtop::portal::Portal;
use crate::vtop::session::{PageResponse, Session};

/// Names of the form inputs that receive the caller's values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormFieldNames {
    pub username: String,
    pub password: String,
    pub captcha: String,
}

impl Default for FormFieldNames {
    fn default() -> Self {
        Self {
            username: "username".to_string(),
            password: "password".to_string(),
            captcha: "captchaCode".to_string(),
        }
    }
}

/// Lowercase substrings used to read the portal's answer to a login POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginMarkers {
    pub success: Vec<String>,
    pub captcha: Vec<String>,
    pub credentials: Vec<String>,
}

impl Default for LoginMarkers {
    fn default() -> Self {
        Self {
            success: vec!["logout".to_string(), "dashboard".to_string()],
            captcha: vec!["captcha".to_string()],
            credentials: vec!["invalid".to_string(), "incorrect".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Rejected(AuthFailure),
    Unclassified,
}

/// Classify the final response of a login submission.
///
/// A 200/302 response is a success when its body carries a success marker or
/// when it landed anywhere other than the login page. Otherwise the body is
/// searched for captcha markers, then credential markers.
pub fn classify_login(
    status: StatusCode,
    body: &str,
    landing_url: &Url,
    login_page_url: &Url,
    markers: &LoginMarkers,
) -> LoginOutcome {
    let body = body.to_lowercase();

    if matches!(status, StatusCode::OK | StatusCode::FOUND)
        && (contains_any(&body, &markers.success) || landing_url != login_page_url)
    {
        return LoginOutcome::Success;
    }
    if contains_any(&body, &markers.captcha) {
        return LoginOutcome::Rejected(AuthFailure::Captcha);
    }
    if contains_any(&body, &markers.credentials) {
        return LoginOutcome::Rejected(AuthFailure::Credentials);
    }
    LoginOutcome::Unclassified
}

fn contains_any(body: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| body.contains(&n.to_lowercase()))
}

/// A login page opened on a live session, waiting for the captcha answer.
pub struct PendingLogin {
    pub session: Session,
    pub captcha_needed: bool,
    /// Absent when the page has no captcha or the image could not be fetched.
    pub captcha_image: Option<Vec<u8>>,
    /// The form as served alongside the captcha.
    pub form: LoginForm,
}

/// What the caller needs to solve the captcha out of band.
#[derive(Debug, Clone)]
pub struct LoginChallenge {
    pub captcha_needed: bool,
    pub captcha_image: Option<Vec<u8>>,
    pub cookies_token: String,
    pub form_action: Option<String>,
}

impl LoginChallenge {
    pub fn captcha_image_b64(&self) -> Option<String> {
        self.captcha_image.as_ref().map(|img| STANDARD.encode(img))
    }
}

impl From<PendingLogin> for LoginChallenge {
    fn from(pending: PendingLogin) -> Self {
        Self {
            captcha_needed: pending.captcha_needed,
            cookies_token: pending.session.token(),
            captcha_image: pending.captcha_image,
            form_action: pending.form.action,
        }
    }
}

#[derive(Clone, custom_debug_derive::Debug)]
pub struct LoginSubmission {
    pub username: String,
    #[debug(skip)]
    pub password: String,
    pub captcha_text: Option<String>,
    /// Overrides the action detected on the login page.
    pub form_action: Option<String>,
}

/// An authenticated session.
#[derive(Clone, custom_debug_derive::Debug)]
pub struct LoginSession {
    #[debug(skip)]
    pub cookies: CookieMap,
    pub landing_url: String,
}

impl Portal {
    /// Phase one on a fresh session: fetch the login page and its captcha.
    #[instrument(skip_all)]
    pub async fn begin_login(&self) -> Result<PendingLogin> {
        let mut session = self.session(CookieMap::new());
        let page = session
            .get_page(&self.login_page_url, self.page_timeout)
            .await?;

        let (captcha_src, form) = {
            let doc = Html::parse_document(&page.text());
            (
                find_captcha_src(&doc, &self.captcha_matchers),
                find_login_form(&doc).unwrap_or_default(),
            )
        };
        debug!(captcha_src = ?captcha_src, form_action = ?form.action, "login page parsed");

        let captcha_image = match &captcha_src {
            Some(src) => self.fetch_captcha(&mut session, src).await,
            None => None,
        };

        Ok(PendingLogin {
            session,
            captcha_needed: captcha_src.is_some(),
            captcha_image,
            form,
        })
    }

    /// Phase one for stateless callers: the session is returned as a token.
    pub async fn start(&self) -> Result<LoginChallenge> {
        let challenge = LoginChallenge::from(self.begin_login().await?);
        info!(
            captcha_needed = challenge.captcha_needed,
            captcha_fetched = challenge.captcha_image.is_some(),
            "login started"
        );
        Ok(challenge)
    }

    /// Rebuild the session carried by a token from [`Portal::start`].
    pub fn resume(&self, token: &str) -> Result<Session> {
        Session::from_token(self.http.clone(), token)
    }

    /// Phase two for stateless callers: rebuild the session from `token`,
    /// fetch the login page again so hidden inputs carry their current
    /// values, then submit.
    pub async fn finish(&self, token: &str, submission: &LoginSubmission) -> Result<LoginSession> {
        let mut session = self.resume(token)?;
        let form = self.login_form(&mut session).await?;
        self.submit_form(session, form, submission).await
    }

    /// Phase two on the session that fetched the captcha. The form from
    /// [`Portal::begin_login`] is submitted as is, so the portal sees the
    /// answer to the captcha it served.
    pub async fn complete_login(
        &self,
        pending: PendingLogin,
        submission: &LoginSubmission,
    ) -> Result<LoginSession> {
        self.submit_form(pending.session, pending.form, submission).await
    }

    /// The login form as currently served to `session`.
    pub async fn login_form(&self, session: &mut Session) -> Result<LoginForm> {
        let page = session
            .get_page(&self.login_page_url, self.page_timeout)
            .await?;
        let doc = Html::parse_document(&page.text());
        Ok(find_login_form(&doc).unwrap_or_default())
    }

    /// Post credentials over `form` on `session` and classify the answer.
    #[instrument(skip_all, fields(username = %submission.username))]
    pub async fn submit_form(
        &self,
        mut session: Session,
        form: LoginForm,
        submission: &LoginSubmission,
    ) -> Result<LoginSession> {
        let action = match non_empty(&submission.form_action).or(form.action.as_deref()) {
            Some(action) => action.to_string(),
            None => {
                warn!(fallback = %self.fallback_action, "no form action found; using fallback");
                self.fallback_action.clone()
            }
        };
        let action_url = Portal::resolve(&self.login_page_url, &action)?;

        let mut fields = form.fields;
        fields.insert(self.fields.username.clone(), submission.username.clone());
        fields.insert(self.fields.password.clone(), submission.password.clone());
        if let Some(captcha) = non_empty(&submission.captcha_text) {
            fields.insert(self.fields.captcha.clone(), captcha.to_string());
        }
        let fields: Vec<(String, String)> = fields.into_iter().collect();

        let mut headers = HeaderMap::new();
        if let Ok(referer) = HeaderValue::from_str(self.login_page_url.as_str()) {
            headers.insert(REFERER, referer);
        }

        debug!(action = %action_url, field_count = fields.len(), "submitting login form");
        let started = Instant::now();
        let resp = session
            .fetch(
                Method::POST,
                action_url,
                Some(&fields),
                &headers,
                self.submit_timeout,
            )
            .await?;
        log_if_slow(started, Duration::from_secs(10), "login submission");

        self.conclude(session, resp)
    }

    fn conclude(&self, session: Session, resp: PageResponse) -> Result<LoginSession> {
        let outcome = classify_login(
            resp.status,
            &resp.text(),
            &resp.url,
            &self.login_page_url,
            &self.markers,
        );

        match outcome {
            LoginOutcome::Success => {
                info!(landing_url = %resp.url, cookies = session.cookies().len(), "login succeeded");
                Ok(LoginSession {
                    cookies: session.into_cookies(),
                    landing_url: resp.url.to_string(),
                })
            }
            LoginOutcome::Rejected(reason) => {
                info!(reason = reason.as_str(), status = resp.status.as_u16(), "login rejected");
                Err(VtopError::Auth(reason))
            }
            LoginOutcome::Unclassified => {
                warn!(status = resp.status.as_u16(), url = %resp.url, "login outcome unrecognized");
                Err(VtopError::UnclassifiedLogin)
            }
        }
    }

    /// Image bytes for `src`, resolved against the login page URL; inline
    /// `data:` URLs are decoded in place.
    async fn fetch_captcha(&self, session: &mut Session, src: &str) -> Option<Vec<u8>> {
        if src.starts_with("data:") {
            let decoded = decode_data_url(src);
            if decoded.is_none() {
                warn!("captcha data URL could not be decoded");
            }
            return decoded;
        }

        let url = match Portal::resolve(&self.login_page_url, src) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "captcha URL is invalid");
                return None;
            }
        };
        match session.get_page(&url, self.page_timeout).await {
            Ok(resp) => Some(resp.body),
            Err(e) => {
                warn!(error = %e, url = %url, "failed to fetch captcha image");
                None
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Payload of a base64 `data:` URL.
fn decode_data_url(src: &str) -> Option<Vec<u8>> {
    let (meta, payload) = src.strip_prefix("data:")?.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(payload).ok()
}
