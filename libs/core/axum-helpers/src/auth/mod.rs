//! Bearer-token verification for protected routes.
//!
//! Tokens are stateless HS256 JWTs. The middleware verifies the signature and
//! expiry and, on success, stores the decoded [`JwtClaims`] in the request
//! extensions, where domain extractors pick them up.
//!
//! ```ignore
//! use axum_helpers::auth::{JwtAuth, JwtConfig, optional_jwt_auth_middleware};
//! use core_config::FromEnv;
//!
//! let auth = JwtAuth::new(&JwtConfig::from_env()?);
//!
//! let routes = Router::new()
//!     .route("/me", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(auth, optional_jwt_auth_middleware));
//! ```

pub mod config;
pub mod jwt;
pub mod middleware;

pub use config::JwtConfig;
pub use jwt::{JwtAuth, JwtClaims};
pub use middleware::optional_jwt_auth_middleware;
