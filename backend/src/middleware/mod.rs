//! Middleware for the escrow API
//!
//! Request/response logging uses `tower_http::trace::TraceLayer`, wired in
//! `main`; only the security headers are custom.

mod security;

pub use security::security_headers;
