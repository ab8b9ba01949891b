//! # Axum Helpers
//!
//! Shared plumbing for the service's Axum apps.
//!
//! - **[`auth`]**: stateless JWT verification middleware
//! - **[`server`]**: router assembly, health checks, graceful shutdown
//! - **[`http`]**: CORS and security headers
//! - **[`errors`]**: generic JSON error responses and the 404 fallback

pub mod auth;
pub mod errors;
pub mod http;
pub mod server;

pub use auth::{JwtAuth, JwtClaims, JwtConfig, optional_jwt_auth_middleware};

pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, build_router, create_production_app,
    create_router, health_router, run_health_checks,
};

pub use http::{allowed_origins_from_env, create_cors_layer, security_headers};

pub use errors::{AppError, ErrorResponse};
