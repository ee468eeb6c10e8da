//! CORS handling
//!
//! Permissive policy: any origin, any method, any header, credentials allowed.
//! Credentials rule out the `*` wildcard, so the caller's `Origin` is echoed.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, CONTENT_LENGTH, ORIGIN, VARY,
};
use hyper::{Method, Response, StatusCode};

use super::response::HttpResponse;

const ALLOWED_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";
const PREFLIGHT_MAX_AGE: &str = "600";

/// Whether the request is a CORS preflight rather than a plain `OPTIONS`
pub fn is_preflight(method: &Method, headers: &HeaderMap) -> bool {
    *method == Method::OPTIONS
        && headers.contains_key(ORIGIN)
        && headers.contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

/// Answer a preflight request
pub fn build_preflight_response(headers: &HeaderMap) -> HttpResponse {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_LENGTH, 0)
        .header(ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS)
        .header(ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            crate::logger::log_error(&format!("Failed to build preflight response: {e}"));
            Response::new(Full::new(Bytes::new()))
        });

    if let Some(requested) = headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
    apply_cors_headers(&mut response, headers.get(ORIGIN));
    response
}

/// Add the simple-response CORS headers when the request carried an `Origin`
pub fn apply_cors_headers(response: &mut HttpResponse, origin: Option<&HeaderValue>) {
    let Some(origin) = origin else {
        return;
    };
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.append(VARY, HeaderValue::from_static("Origin"));
}
