//! HTTP protocol layer module
//!
//! Response builders and CORS handling, decoupled from the route handlers.

pub mod cors;
pub mod response;

pub use response::{
    build_404_response, build_405_response, build_413_response, build_html_response,
    build_json_response, HttpResponse,
};
