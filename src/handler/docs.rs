//! Schema-derived API documentation
//!
//! The OpenAPI document is generated from the `#[utoipa::path]` annotations on
//! the handlers and the `ToSchema` response models. `/docs` and `/redoc` are
//! HTML shells around it that also carry a server-rendered route list, so the
//! pages describe the API even with scripts disabled.

use hyper::StatusCode;
use std::fmt::Write as _;
use std::sync::OnceLock;
use utoipa::OpenApi;

use super::api::{EndpointInfo, HealthResponse, HelloResponse, InfoResponse};
use crate::http::{build_html_response, build_json_response, HttpResponse};

pub const OPENAPI_PATH: &str = "/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "POC3 Python FastAPI Hello World",
        version = "1.0.0",
        description = "Complete CI/CD pipeline demonstration with Python FastAPI"
    ),
    paths(
        crate::handler::pages::landing,
        crate::handler::api::health,
        crate::handler::api::hello,
        crate::handler::api::info,
    ),
    components(schemas(HealthResponse, HelloResponse, InfoResponse, EndpointInfo)),
    tags(
        (name = "system", description = "Landing page and health probe"),
        (name = "api", description = "Demonstration endpoints")
    )
)]
pub struct ApiDoc;

const SWAGGER_UI_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link type="text/css" rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
    <title>__TITLE__ - Swagger UI</title>
</head>
<body>
    <div id="swagger-ui"></div>
    <noscript>
__ROUTES__
    </noscript>
    <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        const ui = SwaggerUIBundle({
            url: '__OPENAPI_URL__',
            dom_id: '#swagger-ui',
            layout: 'BaseLayout',
            deepLinking: true,
            showExtensions: true,
            showCommonExtensions: true,
            presets: [
                SwaggerUIBundle.presets.apis,
                SwaggerUIBundle.SwaggerUIStandalonePreset
            ],
        })
    </script>
</body>
</html>
"#;

const REDOC_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>__TITLE__ - ReDoc</title>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link href="https://fonts.googleapis.com/css?family=Montserrat:300,400,700|Roboto:300,400,700" rel="stylesheet">
    <style>
        body {
            margin: 0;
            padding: 0;
        }
    </style>
</head>
<body>
    <noscript>
__ROUTES__
    </noscript>
    <redoc spec-url="__OPENAPI_URL__"></redoc>
    <script src="https://cdn.jsdelivr.net/npm/redoc@2/bundles/redoc.standalone.js"></script>
</body>
</html>
"#;

/// Generated OpenAPI document, built on first use
pub fn openapi() -> &'static utoipa::openapi::OpenApi {
    static DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();
    DOC.get_or_init(ApiDoc::openapi)
}

/// `GET /openapi.json`
pub fn openapi_json(is_head: bool) -> HttpResponse {
    build_json_response(StatusCode::OK, openapi(), is_head)
}

/// `GET /docs`
pub fn swagger_ui(is_head: bool) -> HttpResponse {
    static PAGE: OnceLock<String> = OnceLock::new();
    let page = PAGE.get_or_init(|| render(SWAGGER_UI_TEMPLATE));
    build_html_response(page.as_str(), is_head)
}

/// `GET /redoc`
pub fn redoc(is_head: bool) -> HttpResponse {
    static PAGE: OnceLock<String> = OnceLock::new();
    let page = PAGE.get_or_init(|| render(REDOC_TEMPLATE));
    build_html_response(page.as_str(), is_head)
}

fn render(template: &str) -> String {
    template
        .replace("__TITLE__", &escape_html(&openapi().info.title))
        .replace("__OPENAPI_URL__", OPENAPI_PATH)
        .replace("__ROUTES__", &render_route_list())
}

/// `(METHOD, path, summary)` for every documented operation
pub fn documented_operations() -> Vec<(String, String, String)> {
    let Ok(doc) = serde_json::to_value(openapi()) else {
        return Vec::new();
    };
    let Some(paths) = doc.get("paths").and_then(|p| p.as_object()) else {
        return Vec::new();
    };

    let mut operations = Vec::new();
    for (path, item) in paths {
        let Some(methods) = item.as_object() else {
            continue;
        };
        for (method, operation) in methods {
            let summary = operation
                .get("summary")
                .and_then(|s| s.as_str())
                .unwrap_or_default();
            operations.push((method.to_uppercase(), path.clone(), summary.to_string()));
        }
    }
    operations
}

fn render_route_list() -> String {
    let mut html = String::from("        <ul>\n");
    for (method, path, summary) in documented_operations() {
        let _ = writeln!(
            html,
            "            <li><code>{} {}</code> {}</li>",
            method,
            escape_html(&path),
            escape_html(&summary)
        );
    }
    html.push_str("        </ul>");
    html
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
