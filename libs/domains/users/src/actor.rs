use axum::{extract::FromRequestParts, http::request::Parts, response::Response};
use axum_helpers::JwtClaims;

use crate::error::UserError;
use crate::format::Format;

/// Role name that grants administrator privileges
pub const ADMIN_ROLE: &str = "admin";

/// The authenticated caller, taken from verified JWT claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub uid: String,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(uid: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            uid: uid.into(),
            roles,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }
}

impl From<JwtClaims> for Actor {
    fn from(claims: JwtClaims) -> Self {
        Self::new(claims.sub, claims.roles)
    }
}

/// Requires claims inserted by the JWT middleware; answers 401 in the
/// negotiated format otherwise.
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<JwtClaims>() {
            Some(claims) => Ok(Actor::from(claims.clone())),
            None => Err(Format::from_headers(&parts.headers).error(UserError::Unauthenticated)),
        }
    }
}
