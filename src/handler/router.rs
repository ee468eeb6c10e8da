//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: CORS preflight, body size guard,
//! exact path match, method validation, handler dispatch and access logging.

use hyper::body::Body as _;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, ORIGIN, REFERER, SERVER, USER_AGENT};
use hyper::{HeaderMap, Method, Request};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::routes::{self, Route, ALLOWED_METHODS};
use super::{api, docs, pages};
use crate::config::AppState;
use crate::http::{self, cors, HttpResponse};
use crate::logger::{self, AccessLogEntry};

/// Main entry point for HTTP request handling
///
/// Generic over the body type: no route reads a request body, only its
/// declared length.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<HttpResponse, Infallible> {
    let started = Instant::now();
    let method = req.method();
    let path = req.uri().path();
    let headers = req.headers();
    let enable_cors = state.config.http.enable_cors;

    let mut response = if enable_cors && cors::is_preflight(method, headers) {
        cors::build_preflight_response(headers)
    } else if let Some(resp) = check_body_size(headers, state.config.http.max_body_size) {
        resp
    } else {
        route_request(method, path)
    };

    if enable_cors && !cors::is_preflight(method, headers) {
        cors::apply_cors_headers(&mut response, headers.get(ORIGIN));
    }
    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server);
    }

    if state.access_log_enabled() {
        log_access(&req, &response, peer_addr, started, &state);
    }

    Ok(response)
}

/// Resolve the route and dispatch; 404 for unknown paths, 405 for other methods
fn route_request(method: &Method, path: &str) -> HttpResponse {
    let Some(route) = routes::lookup(path) else {
        logger::log_debug(&format!("No route for {path}"));
        return http::build_404_response();
    };

    let is_head = match *method {
        Method::GET => false,
        Method::HEAD => true,
        _ => {
            logger::log_warning(&format!("Method not allowed: {method} {path}"));
            return http::build_405_response(ALLOWED_METHODS);
        }
    };

    dispatch(route, is_head)
}

fn dispatch(route: Route, is_head: bool) -> HttpResponse {
    match route {
        Route::Landing => pages::landing(is_head),
        Route::Health => api::health(is_head),
        Route::Hello => api::hello(is_head),
        Route::Info => api::info(is_head),
        Route::SwaggerUi => docs::swagger_ui(is_head),
        Route::Redoc => docs::redoc(is_head),
        Route::OpenApiJson => docs::openapi_json(is_head),
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<HttpResponse> {
    let content_length = headers.get(CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

fn log_access<B>(
    req: &Request<B>,
    response: &HttpResponse,
    peer_addr: SocketAddr,
    started: Instant,
    state: &AppState,
) {
    let header_string = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
        .unwrap_or(usize::MAX);
    entry.referer = header_string(REFERER);
    entry.user_agent = header_string(USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &state.config.logging.access_log_format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::header::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_REQUEST_METHOD, ALLOW, CONTENT_TYPE,
    };
    use hyper::StatusCode;
    use serde_json::Value;

    fn test_state() -> Arc<AppState> {
        let state = AppState::new(&Config::from_defaults().unwrap());
        state.set_access_log(false);
        Arc::new(state)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn send(method: Method, path: &str) -> HttpResponse {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .body(())
            .unwrap();
        handle_request(req, test_state(), peer()).await.unwrap()
    }

    async fn get(path: &str) -> HttpResponse {
        send(Method::GET, path).await
    }

    async fn body_bytes(response: HttpResponse) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    async fn json_body(response: HttpResponse) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    fn content_type(response: &HttpResponse) -> &str {
        response.headers()[CONTENT_TYPE].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_landing_page() {
        let response = get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(content_type(&response).starts_with("text/html"));
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains("POC3 Hello World"));
    }

    #[tokio::test]
    async fn test_health() {
        let response = get("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), "application/json");
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "poc3-python-fastapi");
        assert_eq!(body["version"], "1.0.0");
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_health_timestamps_non_decreasing() {
        let first = json_body(get("/health").await).await;
        let second = json_body(get("/health").await).await;
        let parse = |v: &Value| chrono::DateTime::parse_from_rfc3339(v.as_str().unwrap()).unwrap();
        assert!(parse(&second["timestamp"]) >= parse(&first["timestamp"]));
    }

    #[tokio::test]
    async fn test_hello() {
        let response = get("/api/hello").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Hello World from Python FastAPI POC3!");
        assert_eq!(body["service"], "python-fastapi-api");
        assert!(body["environment"].is_string());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    #[allow(clippy::await_holding_lock)]
    async fn test_hello_echoes_environment_per_request() {
        let _guard = api::ENVIRONMENT_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        std::env::set_var(api::ENVIRONMENT_VAR, "staging");
        assert_eq!(json_body(get("/api/hello").await).await["environment"], "staging");

        std::env::set_var(api::ENVIRONMENT_VAR, "production");
        assert_eq!(json_body(get("/api/hello").await).await["environment"], "production");

        std::env::remove_var(api::ENVIRONMENT_VAR);
        assert_eq!(json_body(get("/api/hello").await).await["environment"], "development");
    }

    #[tokio::test]
    async fn test_info() {
        let response = get("/api/info").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["application"], "POC3 Python FastAPI Hello World");
        assert_eq!(body["version"], "1.0.0");
        let technologies = body["technologies"].as_array().unwrap();
        assert!(technologies.contains(&Value::from("Python")));
        assert!(technologies.contains(&Value::from("FastAPI")));

        let endpoints = body["endpoints"].as_array().unwrap();
        assert!(endpoints.len() >= 4);
        for path in ["/health", "/api/hello", "/api/info", "/docs", "/redoc"] {
            assert!(endpoints.iter().any(|e| e["path"] == path), "missing {path}");
        }
        for endpoint in endpoints {
            for field in ["path", "method", "description"] {
                assert!(!endpoint[field].as_str().unwrap().is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_docs_pages() {
        for path in ["/docs", "/redoc"] {
            let response = get(path).await;
            assert_eq!(response.status(), StatusCode::OK, "{path}");
            assert!(content_type(&response).starts_with("text/html"), "{path}");
        }
    }

    #[tokio::test]
    async fn test_openapi_json() {
        let response = get("/openapi.json").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["openapi"].as_str().unwrap().starts_with('3'));
        assert!(body["paths"]["/api/info"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = get("/api/unknown").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["detail"], "Not Found");
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let response = send(Method::POST, "/health").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD");

        let response = send(Method::DELETE, "/api/info").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let response = send(Method::HEAD, "/api/info").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_ne!(response.headers()[CONTENT_LENGTH], "0");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_requests_are_idempotent() {
        let first = json_body(get("/api/info").await).await;
        for _ in 0..3 {
            let _ = get("/health").await;
            let _ = get("/api/hello").await;
        }
        assert_eq!(json_body(get("/api/info").await).await, first);
    }

    #[tokio::test]
    async fn test_cors_echoes_origin() {
        let req = Request::builder()
            .uri("/health")
            .header(ORIGIN, "https://dashboard.example.com")
            .body(())
            .unwrap();
        let response = handle_request(req, test_state(), peer()).await.unwrap();
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://dashboard.example.com"
        );
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_preflight() {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/hello")
            .header(ORIGIN, "https://dashboard.example.com")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(())
            .unwrap();
        let response = handle_request(req, test_state(), peer()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://dashboard.example.com"
        );
    }

    #[tokio::test]
    async fn test_plain_options_is_405() {
        let response = send(Method::OPTIONS, "/health").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .header(CONTENT_LENGTH, "999999999")
            .body(())
            .unwrap();
        let response = handle_request(req, test_state(), peer()).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_server_header() {
        let response = get("/health").await;
        assert_eq!(response.headers()[SERVER], "poc3-hello/1.0");
    }
}
