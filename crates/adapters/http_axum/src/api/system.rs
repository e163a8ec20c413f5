//! System endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// `HEAD|GET /system/status` — reachable and authenticated.
#[must_use]
pub fn status() -> Response {
    StatusCode::OK.into_response()
}
