use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// The fallback for requests that match no route.
pub async fn get_404_not_found() -> Response {
    get_404_not_found_response()
}

/// A JSON 404 response in the same shape as other API errors.
pub fn get_404_not_found_response() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}
