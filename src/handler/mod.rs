//! Request handler module
//!
//! Route table, dispatch and the per-route handlers: landing page, JSON
//! endpoints and the generated API documentation.

pub mod api;
pub mod docs;
pub mod pages;
pub mod router;
pub mod routes;

// Re-export main entry point
pub use router::handle_request;
