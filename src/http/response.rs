//! Response writers for route handlers.
//!
//! # Responsibilities
//! - Serialize JSON and HTML bodies with the right Content-Type
//! - Build the structured `{ "error": "..." }` body used for failures
//!
//! # Design Decisions
//! - Handlers build their own responses; the dispatcher never rewrites them
//! - A value that fails to serialize becomes a 500 JSON error, not a panic

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Serialize `data` as a JSON response.
pub fn send_json<T: Serialize + ?Sized>(data: &T, status: StatusCode) -> Response {
    match serde_json::to_vec(data) {
        Ok(bytes) => with_content_type(status, JSON_CONTENT_TYPE, Body::from(bytes)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize JSON response");
            send_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to serialize response")
        }
    }
}

/// Send an HTML document.
pub fn send_html(html: impl Into<String>, status: StatusCode) -> Response {
    with_content_type(status, HTML_CONTENT_TYPE, Body::from(html.into()))
}

/// Structured error body: `{ "error": "<message>" }`.
pub fn send_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    with_content_type(status, JSON_CONTENT_TYPE, Body::from(body.to_string()))
}

fn with_content_type(status: StatusCode, content_type: &'static str, body: Body) -> Response {
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
