//! Middleware for logging requests and responses.

use axum::{
    Json,
    body::{Body, Bytes, to_bytes},
    extract::Request,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

/// The number of characters of a body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// JSON fields whose names end with this suffix are masked in the logs.
const ACCOUNT_NUMBER_SUFFIX: &str = "AccountNumber";
/// The number of trailing characters of an account number left visible in the logs.
const VISIBLE_ACCOUNT_DIGITS: usize = 4;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
/// Account numbers in JSON bodies are masked.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read request body: {error}");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "could not read request body" })),
            )
                .into_response();
        }
    };

    let display_text = display_body(&parts.headers, &body_bytes);
    log_request(&parts, &display_text);

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read response body: {error}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Something went wrong" })),
            )
                .into_response();
        }
    };

    let display_text = display_body(&parts.headers, &body_bytes);
    log_response(&parts, &display_text);

    Response::from_parts(parts, Body::from(body_bytes))
}

fn display_body(headers: &HeaderMap, body: &Bytes) -> String {
    let text = String::from_utf8_lossy(body);

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/json"));

    if is_json {
        mask_account_numbers(&text)
    } else {
        text.into_owned()
    }
}

/// Replace all but the last few characters of every account number in a JSON
/// document. Text that is not JSON is returned unchanged.
fn mask_account_numbers(json_text: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(json_text) else {
        return json_text.to_owned();
    };

    mask_value(&mut value);

    value.to_string()
}

fn mask_value(value: &mut Value) {
    match value {
        Value::Object(object) => {
            for (key, field) in object.iter_mut() {
                match field {
                    Value::String(account_number) if key.ends_with(ACCOUNT_NUMBER_SUFFIX) => {
                        *account_number = mask_account_number(account_number);
                    }
                    field => mask_value(field),
                }
            }
        }
        Value::Array(values) => values.iter_mut().for_each(mask_value),
        _ => {}
    }
}

fn mask_account_number(account_number: &str) -> String {
    let length = account_number.chars().count();
    let visible: String = account_number
        .chars()
        .skip(length.saturating_sub(VISIBLE_ACCOUNT_DIGITS))
        .collect();

    format!("****{visible}")
}

fn truncate(text: &str) -> Option<&str> {
    text.char_indices()
        .nth(LOG_BODY_LENGTH_LIMIT)
        .map(|(end, _)| &text[..end])
}

fn log_request(headers: &axum::http::request::Parts, body: &str) {
    match truncate(body) {
        Some(truncated) => {
            tracing::info!("Received request: {headers:#?}\nbody: {truncated}...");
            tracing::debug!("Full request body: {body:?}");
        }
        None => tracing::info!("Received request: {headers:#?}\nbody: {body:?}"),
    }
}

fn log_response(headers: &axum::http::response::Parts, body: &str) {
    match truncate(body) {
        Some(truncated) => {
            tracing::info!("Sending response: {headers:#?}\nbody: {truncated}...");
            tracing::debug!("Full response body: {body:?}");
        }
        None => tracing::info!("Sending response: {headers:#?}\nbody: {body:?}"),
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, middleware, routing::post};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use super::{LOG_BODY_LENGTH_LIMIT, logging_middleware, mask_account_numbers, truncate};

    #[test]
    fn masks_nested_account_numbers() {
        let text = json!({
            "transactions": [
                { "senderAccountNumber": "1234567890", "receiverAccountNumber": "555", "amount": 1.0 }
            ],
            "senderAccountNumber": "ACC-98765",
        })
        .to_string();

        let got: Value = serde_json::from_str(&mask_account_numbers(&text)).unwrap();

        assert_eq!(
            got,
            json!({
                "transactions": [
                    { "senderAccountNumber": "****7890", "receiverAccountNumber": "****555", "amount": 1.0 }
                ],
                "senderAccountNumber": "****8765",
            })
        );
    }

    #[test]
    fn leaves_non_json_alone() {
        assert_eq!(mask_account_numbers("not json"), "not json");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        let short = "₹".repeat(LOG_BODY_LENGTH_LIMIT);
        let long = "₹".repeat(LOG_BODY_LENGTH_LIMIT + 1);

        assert_eq!(truncate(&short), None);
        assert_eq!(truncate(&long), Some(short.as_str()));
    }

    #[tokio::test]
    async fn passes_bodies_through_unchanged() {
        let app = Router::new()
            .route("/echo", post(|Json(body): Json<Value>| async { Json(body) }))
            .layer(middleware::from_fn(logging_middleware));
        let server = TestServer::try_new(app).expect("Could not create test server.");
        let body = json!({ "senderAccountNumber": "1234567890" });

        let response = server.post("/echo").json(&body).await;

        response.assert_status_ok();
        response.assert_json(&body);
    }
}
