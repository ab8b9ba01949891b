use axum::{Router, middleware};
use axum_helpers::{JwtAuth, optional_jwt_auth_middleware};

pub mod health;
pub mod users;

/// Creates the API routes without the `/api` prefix.
/// The `/api` prefix will be added by the `create_router` helper.
pub fn routes(state: &crate::state::AppState) -> Router {
    let api = Router::new().nest(domain_users::handlers::URL, users::router(state));
    with_jwt(api, state.jwt.clone())
}

/// Verify tokens in front of `router`; the users handlers answer 401
/// themselves when no valid token was presented.
fn with_jwt(router: Router, jwt: JwtAuth) -> Router {
    router.layer(middleware::from_fn_with_state(
        jwt,
        optional_jwt_auth_middleware,
    ))
}

/// Creates a router with the /ready endpoint that performs actual health checks.
///
/// This router has state applied and can be merged with the stateless app router
/// from `create_router`.
pub fn ready_router(state: crate::state::AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
