//! HTTP response building module
//!
//! Builders for the status codes the service can produce, decoupled from the
//! route handlers.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

pub type HttpResponse = Response<Full<Bytes>>;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build 200 HTML response; `HEAD` keeps the length but drops the body
pub fn build_html_response(content: impl Into<Bytes>, is_head: bool) -> HttpResponse {
    build_body_response(StatusCode::OK, HTML_CONTENT_TYPE, content.into(), is_head)
}

/// Serialize `body` as JSON with the given status
pub fn build_json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
    is_head: bool,
) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(json) => build_body_response(status, JSON_CONTENT_TYPE, Bytes::from(json), is_head),
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            build_500_response()
        }
    }
}

/// Build 404 Not Found response
pub fn build_404_response() -> HttpResponse {
    build_detail_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Build 405 Method Not Allowed response listing the accepted methods
pub fn build_405_response(allow: &str) -> HttpResponse {
    let mut response = build_detail_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    if let Ok(value) = allow.parse() {
        response.headers_mut().insert(ALLOW, value);
    }
    response
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> HttpResponse {
    build_detail_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> HttpResponse {
    build_detail_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

/// Error body shaped as `{"detail": "..."}`
fn build_detail_response(status: StatusCode, detail: &'static str) -> HttpResponse {
    let body = serde_json::json!({ "detail": detail }).to_string();
    build_body_response(status, JSON_CONTENT_TYPE, Bytes::from(body), false)
}

fn build_body_response(
    status: StatusCode,
    content_type: &str,
    data: Bytes,
    is_head: bool,
) -> HttpResponse {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            Response::new(Full::new(Bytes::new()))
        })
}

fn log_build_error(status: StatusCode, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
