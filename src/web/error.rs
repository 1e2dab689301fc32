//! API error responses: an HTTP status plus a `{"detail": ...}` body.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{debug, warn};

use crate::vtop::VtopError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection, "rejected request body");
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
    }
}

/// Map a portal error to a response. `stage` names what was being fetched
/// and prefixes the detail of upstream failures.
pub fn portal_error(stage: &str, err: VtopError) -> ApiError {
    match err {
        VtopError::Fetch { status, ref url } => {
            warn!(stage, status = status.as_u16(), url = %url, "portal returned an error status");
            ApiError::new(StatusCode::BAD_GATEWAY, format!("{stage}: {}", status.as_u16()))
        }
        VtopError::Transport { .. }
        | VtopError::Timeout { .. }
        | VtopError::TooManyRedirects { .. } => {
            warn!(stage, error = ?err, "portal unreachable");
            ApiError::new(StatusCode::BAD_GATEWAY, format!("{stage}: portal unreachable"))
        }
        VtopError::Decode(msg) => {
            ApiError::bad_request(format!("Invalid prelogin_cookies_token: {msg}"))
        }
        VtopError::InvalidUrl { .. } => ApiError::bad_request(err.to_string()),
        VtopError::NotFound(msg) => ApiError::not_found(msg),
        VtopError::Auth(reason) => ApiError::new(StatusCode::UNAUTHORIZED, reason.message()),
        VtopError::UnclassifiedLogin => ApiError::bad_request(err.to_string()),
    }
}
