// Landing page

use crate::http::{build_html_response, HttpResponse};

pub const LANDING_PAGE: &str = include_str!("landing.html");

/// Landing page
///
/// Static HTML confirming a successful deployment.
#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses(
        (status = 200, description = "Landing page", content_type = "text/html", body = String)
    )
)]
pub fn landing(is_head: bool) -> HttpResponse {
    build_html_response(LANDING_PAGE, is_head)
}
