//! Cookie-carrying HTTP session against the portal.
//!
//! The session owns its cookies as a plain [`CookieMap`] instead of relying on
//! a client-side jar, so that the whole session state can be handed to a
//! caller as a token and rebuilt on the next request. Redirects are followed
//! here, hop by hop, so `Set-Cookie` headers on intermediate responses are
//! not lost.

use reqwest::header::{COOKIE, HeaderMap, HeaderValue, LOCATION, SET_COOKIE};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

use crate::vtop::cookies::{self, CookieMap};
use crate::vtop::errors::{Result, VtopError};

/// Upper bound on redirect hops for one request.
const MAX_REDIRECTS: usize = 10;

/// A fully received response, after redirects.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: StatusCode,
    /// Final URL once redirects were followed.
    pub url: Url,
    pub body: Vec<u8>,
}

impl PageResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx response into [`VtopError::Fetch`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(VtopError::Fetch {
                status: self.status,
                url: self.url.to_string(),
            })
        }
    }
}

pub struct Session {
    http: reqwest::Client,
    cookies: CookieMap,
}

impl Session {
    /// `http` must be built with redirects disabled; see [`build_client`].
    pub fn new(http: reqwest::Client, cookies: CookieMap) -> Self {
        Self { http, cookies }
    }

    /// Rebuild a session from a token produced by [`Session::token`].
    pub fn from_token(http: reqwest::Client, token: &str) -> Result<Self> {
        Ok(Self::new(http, cookies::decode(token)?))
    }

    pub fn cookies(&self) -> &CookieMap {
        &self.cookies
    }

    pub fn into_cookies(self) -> CookieMap {
        self.cookies
    }

    pub fn token(&self) -> String {
        cookies::encode(&self.cookies)
    }

    /// GET `url`, failing on any non-success status.
    pub async fn get_page(&mut self, url: &Url, timeout: Duration) -> Result<PageResponse> {
        self.fetch(Method::GET, url.clone(), None, &HeaderMap::new(), timeout)
            .await?
            .error_for_status()
    }

    /// Send a request with the session cookies, following redirects.
    ///
    /// `timeout` bounds the whole redirect chain, body included. Cookies are
    /// only sent to the host of the first request.
    ///
    /// The final response is returned whatever its status; use
    /// [`PageResponse::error_for_status`] where a non-success status is fatal.
    pub async fn fetch(
        &mut self,
        method: Method,
        url: Url,
        form: Option<&[(String, String)]>,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<PageResponse> {
        let origin = url.clone();
        match tokio::time::timeout(timeout, self.follow(method, url, form, headers)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %origin, timeout = ?timeout, "portal request timed out");
                Err(VtopError::Timeout {
                    url: origin.to_string(),
                })
            }
        }
    }

    async fn follow(
        &mut self,
        method: Method,
        url: Url,
        form: Option<&[(String, String)]>,
        headers: &HeaderMap,
    ) -> Result<PageResponse> {
        let origin = url.clone();
        let (mut method, mut url, mut form) = (method, url, form);

        for hop in 0..=MAX_REDIRECTS {
            let mut req = self
                .http
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            let on_origin = same_host(&origin, &url);
            if !on_origin {
                debug!(from = %origin, to = %url, "withholding cookies from foreign host");
            } else if let Some(value) = self.cookie_header() {
                req = req.header(COOKIE, value);
            }
            if let Some(fields) = form {
                req = req.form(fields);
            }

            trace!(%method, url = %url, hop, "sending request");
            let resp = req.send().await.map_err(|source| VtopError::Transport {
                url: url.to_string(),
                source,
            })?;
            if on_origin {
                self.absorb_set_cookie(resp.headers());
            }

            let status = resp.status();
            let location = resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            if status.is_redirection()
                && let Some(location) = location
            {
                let next = url.join(&location).map_err(|source| VtopError::InvalidUrl {
                    input: location.clone(),
                    source,
                })?;
                if !matches!(
                    status,
                    StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
                ) {
                    method = Method::GET;
                    form = None;
                }
                debug!(status = status.as_u16(), from = %url, to = %next, "following redirect");
                url = next;
                continue;
            }

            let body = resp
                .bytes()
                .await
                .map_err(|source| VtopError::Transport {
                    url: url.to_string(),
                    source,
                })?
                .to_vec();
            debug!(status = status.as_u16(), url = %url, bytes = body.len(), "response received");
            return Ok(PageResponse { status, url, body });
        }

        Err(VtopError::TooManyRedirects {
            url: origin.to_string(),
        })
    }

    fn cookie_header(&self) -> Option<HeaderValue> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        match HeaderValue::from_str(&joined) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(count = self.cookies.len(), "cookie values are not a valid header; sending none");
                None
            }
        }
    }

    /// Apply every `Set-Cookie` header. Cookies that are already expired are removed.
    fn absorb_set_cookie(&mut self, headers: &HeaderMap) {
        let now = time::OffsetDateTime::now_utc();
        for raw in headers.get_all(SET_COOKIE) {
            let Ok(raw) = raw.to_str() else { continue };
            let Ok(parsed) = cookie::Cookie::parse(raw) else {
                debug!("ignoring unparsable Set-Cookie header");
                continue;
            };

            let expired = parsed
                .max_age()
                .is_some_and(|age| age.is_zero() || age.is_negative())
                || parsed.expires_datetime().is_some_and(|at| at <= now);

            if expired {
                self.cookies.remove(parsed.name());
            } else {
                self.cookies
                    .insert(parsed.name().to_string(), parsed.value().to_string());
            }
        }
    }
}

/// Session cookies belong to the portal host; ports and schemes are not compared.
fn same_host(origin: &Url, target: &Url) -> bool {
    origin.host_str().is_some_and(|host| target.host_str() == Some(host))
}

/// Build the HTTP client shared by all sessions.
pub fn build_client(user_agent: &str, accept_invalid_certs: bool) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(user_agent)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
}
