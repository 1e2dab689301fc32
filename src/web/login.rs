//! Two-step login handlers.
//!
//! `/login/start` hands the caller the captcha image and a cookie token;
//! `/login/finish` takes the token back with the credentials and captcha text.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::state::AppState;
use crate::vtop::{CookieMap, LoginSubmission};
use crate::web::ApiJson;
use crate::web::error::{ApiError, portal_error};

const LOGIN_PAGE_STAGE: &str = "Failed to open login page";
const SUBMIT_STAGE: &str = "Failed to submit login";

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub captcha_needed: bool,
    pub captcha_image_b64: Option<String>,
    pub prelogin_cookies_token: String,
    pub login_form_action: Option<String>,
}

#[derive(Deserialize, custom_debug_derive::Debug)]
pub struct FinishRequest {
    pub username: String,
    #[debug(skip)]
    pub password: String,
    #[serde(default)]
    pub captcha_text: Option<String>,
    pub prelogin_cookies_token: String,
    #[serde(default)]
    pub login_form_action: Option<String>,
}

#[derive(Serialize, custom_debug_derive::Debug)]
pub struct FinishResponse {
    pub success: bool,
    #[debug(skip)]
    pub cookies: CookieMap,
    pub landing_url: String,
}

/// `POST /login/start`
#[instrument(skip_all)]
pub(super) async fn login_start(
    State(state): State<AppState>,
) -> Result<Json<StartResponse>, ApiError> {
    let challenge = state
        .portal
        .start()
        .await
        .map_err(|e| portal_error(LOGIN_PAGE_STAGE, e))?;

    Ok(Json(StartResponse {
        captcha_needed: challenge.captcha_needed,
        captcha_image_b64: challenge.captcha_image_b64(),
        prelogin_cookies_token: challenge.cookies_token,
        login_form_action: challenge.form_action,
    }))
}

/// `POST /login/finish`
#[instrument(skip_all, fields(username = %req.username))]
pub(super) async fn login_finish(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FinishRequest>,
) -> Result<Json<FinishResponse>, ApiError> {
    let submission = LoginSubmission {
        username: req.username,
        password: req.password,
        captcha_text: req.captcha_text,
        form_action: req.login_form_action,
    };

    let portal = &state.portal;
    let mut session = portal
        .resume(&req.prelogin_cookies_token)
        .map_err(|e| portal_error(LOGIN_PAGE_STAGE, e))?;
    let form = portal
        .login_form(&mut session)
        .await
        .map_err(|e| portal_error(LOGIN_PAGE_STAGE, e))?;
    let session = portal
        .submit_form(session, form, &submission)
        .await
        .map_err(|e| portal_error(SUBMIT_STAGE, e))?;

    Ok(Json(FinishResponse {
        success: true,
        cookies: session.cookies,
        landing_url: session.landing_url,
    }))
}
