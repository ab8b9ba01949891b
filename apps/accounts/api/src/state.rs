//! Application state management.
//!
//! This module defines the shared application state used to build the
//! routers. The state contains:
//! - Configuration
//! - PostgreSQL connection pool
//! - JWT verifier

use axum_helpers::JwtAuth;

/// Shared application state.
///
/// Cloning is cheap: the connection pool and JWT keys are reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded from environment variables
    pub config: crate::config::Config,
    /// PostgreSQL database connection pool
    pub db: database::postgres::DatabaseConnection,
    /// Verifies bearer/cookie tokens for the users routes
    pub jwt: JwtAuth,
}
