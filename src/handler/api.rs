//! JSON endpoints: health probe, hello message and application info

use hyper::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

use super::routes;
use crate::clock;
use crate::http::{build_json_response, HttpResponse};

pub const APPLICATION_NAME: &str = "POC3 Python FastAPI Hello World";
pub const APPLICATION_VERSION: &str = "1.0.0";
pub const APPLICATION_DESCRIPTION: &str =
    "Complete CI/CD pipeline demonstration with Python FastAPI";
pub const HEALTH_SERVICE_NAME: &str = "poc3-python-fastapi";
pub const HELLO_SERVICE_NAME: &str = "python-fastapi-api";
pub const HELLO_MESSAGE: &str = "Hello World from Python FastAPI POC3!";
pub const TECHNOLOGIES: [&str; 4] = ["Python", "FastAPI", "Uvicorn", "Pydantic"];

pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Serialises tests that set or remove `ENVIRONMENT`
#[cfg(test)]
pub static ENVIRONMENT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Health probe payload
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub service: String,
    pub version: String,
}

/// Hello world payload
#[derive(Debug, Serialize, ToSchema)]
pub struct HelloResponse {
    pub message: String,
    pub timestamp: String,
    pub environment: String,
    pub service: String,
}

/// One entry of the endpoint catalogue
#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

/// Application descriptor
#[derive(Debug, Serialize, ToSchema)]
pub struct InfoResponse {
    pub application: String,
    pub version: String,
    pub technologies: Vec<String>,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

impl HealthResponse {
    pub fn current() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: clock::now_iso8601(),
            service: HEALTH_SERVICE_NAME.to_string(),
            version: APPLICATION_VERSION.to_string(),
        }
    }
}

impl HelloResponse {
    pub fn new(environment: String) -> Self {
        Self {
            message: HELLO_MESSAGE.to_string(),
            timestamp: clock::now_iso8601(),
            environment,
            service: HELLO_SERVICE_NAME.to_string(),
        }
    }
}

impl InfoResponse {
    pub fn catalogue() -> Self {
        Self {
            application: APPLICATION_NAME.to_string(),
            version: APPLICATION_VERSION.to_string(),
            technologies: TECHNOLOGIES.iter().map(ToString::to_string).collect(),
            description: APPLICATION_DESCRIPTION.to_string(),
            endpoints: routes::catalogue()
                .map(|e| EndpointInfo {
                    path: e.path.to_string(),
                    method: "GET".to_string(),
                    description: e.description.to_string(),
                })
                .collect(),
        }
    }
}

/// Deployment label, re-read from the process environment on every call
pub fn current_environment() -> String {
    std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
}

/// Health check
///
/// Liveness probe for the deployment pipeline.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub fn health(is_head: bool) -> HttpResponse {
    build_json_response(StatusCode::OK, &HealthResponse::current(), is_head)
}

/// Hello world message
///
/// Echoes the deployment environment taken from `ENVIRONMENT`.
#[utoipa::path(
    get,
    path = "/api/hello",
    tag = "api",
    responses(
        (status = 200, description = "Greeting", body = HelloResponse)
    )
)]
pub fn hello(is_head: bool) -> HttpResponse {
    let body = HelloResponse::new(current_environment());
    build_json_response(StatusCode::OK, &body, is_head)
}

/// Application info
///
/// Static description of the application and its endpoints.
#[utoipa::path(
    get,
    path = "/api/info",
    tag = "api",
    responses(
        (status = 200, description = "Application descriptor", body = InfoResponse)
    )
)]
pub fn info(is_head: bool) -> HttpResponse {
    build_json_response(StatusCode::OK, &InfoResponse::catalogue(), is_head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_constants() {
        let health = HealthResponse::current();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "poc3-python-fastapi");
        assert_eq!(health.version, "1.0.0");
        assert!(chrono::DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
    }

    #[test]
    fn test_environment_read_per_call() {
        let _guard = ENVIRONMENT_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::env::set_var(ENVIRONMENT_VAR, "staging");
        assert_eq!(HelloResponse::new(current_environment()).environment, "staging");

        std::env::set_var(ENVIRONMENT_VAR, "production");
        assert_eq!(current_environment(), "production");

        std::env::remove_var(ENVIRONMENT_VAR);
        assert_eq!(current_environment(), "development");
    }

    #[test]
    fn test_info_catalogue() {
        let info = InfoResponse::catalogue();
        assert_eq!(info.application, "POC3 Python FastAPI Hello World");
        assert_eq!(info.version, "1.0.0");
        assert!(info.technologies.iter().any(|t| t == "Python"));
        assert!(info.technologies.iter().any(|t| t == "FastAPI"));
        assert_eq!(info.endpoints.len(), 5);
        for endpoint in &info.endpoints {
            assert!(!endpoint.path.is_empty());
            assert_eq!(endpoint.method, "GET");
            assert!(!endpoint.description.is_empty());
        }
    }
}
