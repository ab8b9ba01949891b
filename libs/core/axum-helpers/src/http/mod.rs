//! HTTP middleware: CORS and security headers.

pub mod cors;
pub mod security;

pub use cors::{allowed_origins_from_env, create_cors_layer};
pub use security::security_headers;
