//! HTTP service exposing the two-step login and timetable scraping.

use axum::extract::FromRequest;

pub mod error;
pub mod login;
pub mod middleware;
pub mod routes;
pub mod status;
pub mod timetable;

pub use routes::*;

use crate::web::error::ApiError;

/// JSON body extractor whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
