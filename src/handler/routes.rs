//! Route table
//!
//! Single source for path matching, the `/api/info` endpoint catalogue and the
//! method list advertised on 405 responses.

/// Methods every route accepts
pub const ALLOWED_METHODS: &str = "GET, HEAD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Health,
    Hello,
    Info,
    SwaggerUi,
    Redoc,
    OpenApiJson,
}

pub struct RouteEntry {
    pub route: Route,
    pub path: &'static str,
    pub description: &'static str,
    /// Listed in the `/api/info` endpoint catalogue
    pub catalogued: bool,
}

pub const ROUTES: &[RouteEntry] = &[
    RouteEntry {
        route: Route::Landing,
        path: "/",
        description: "Landing page",
        catalogued: false,
    },
    RouteEntry {
        route: Route::Health,
        path: "/health",
        description: "Health check",
        catalogued: true,
    },
    RouteEntry {
        route: Route::Hello,
        path: "/api/hello",
        description: "Hello world message",
        catalogued: true,
    },
    RouteEntry {
        route: Route::Info,
        path: "/api/info",
        description: "Application info",
        catalogued: true,
    },
    RouteEntry {
        route: Route::SwaggerUi,
        path: "/docs",
        description: "OpenAPI documentation",
        catalogued: true,
    },
    RouteEntry {
        route: Route::Redoc,
        path: "/redoc",
        description: "ReDoc documentation",
        catalogued: true,
    },
    RouteEntry {
        route: Route::OpenApiJson,
        path: "/openapi.json",
        description: "OpenAPI schema",
        catalogued: false,
    },
];

/// Exact path match
pub fn lookup(path: &str) -> Option<Route> {
    ROUTES.iter().find(|e| e.path == path).map(|e| e.route)
}

/// Routes shown in the `/api/info` catalogue, in declaration order
pub fn catalogue() -> impl Iterator<Item = &'static RouteEntry> {
    ROUTES.iter().filter(|e| e.catalogued)
}
