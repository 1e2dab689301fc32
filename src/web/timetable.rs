//! Timetable scraping handler.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::state::AppState;
use crate::vtop::{CookieMap, TableRow};
use crate::web::ApiJson;
use crate::web::error::{ApiError, portal_error};

#[derive(Deserialize)]
pub struct TimetableRequest {
    pub cookies: CookieMap,
    /// Overrides the default timetable page.
    #[serde(default)]
    pub timetable_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TimetableResponse {
    pub success: bool,
    pub count: usize,
    pub rows: Vec<TableRow>,
}

/// `POST /timetable`
#[instrument(skip_all)]
pub(super) async fn timetable(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TimetableRequest>,
) -> Result<Json<TimetableResponse>, ApiError> {
    let rows = state
        .portal
        .timetable(req.cookies, req.timetable_url.as_deref())
        .await
        .map_err(|e| portal_error("Failed to fetch timetable", e))?;

    Ok(Json(TimetableResponse {
        success: true,
        count: rows.len(),
        rows,
    }))
}
