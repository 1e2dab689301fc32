//! Web API router construction.

use axum::{
    Router,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{login, status, timetable};

/// Bounds a whole handler, which may chain several portal round-trips.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health))
        .route("/login/start", post(login::login_start))
        .route("/login/finish", post(login::login_finish))
        .route("/timetable", post(timetable::timetable))
        .fallback(not_found)
        .with_state(app_state)
        .layer((
            // Outermost: per-request ID span + severity-proportional response logging.
            RequestIdLayer,
            // Any origin may call the API.
            CorsLayer::permissive(),
            TimeoutLayer::new(REQUEST_TIMEOUT),
        ))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not Found")
}
