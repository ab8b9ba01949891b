use super::config::JwtConfig;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(any(test, feature = "test-utils"))]
use chrono::{Duration, Utc};
#[cfg(any(test, feature = "test-utils"))]
use jsonwebtoken::{EncodingKey, Header, encode};
#[cfg(any(test, feature = "test-utils"))]
use uuid::Uuid;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,        // Subject (user uid)
    pub email: String,      // User email
    pub name: String,       // User name
    pub roles: Vec<String>, // Role names
    pub exp: i64,           // Expiration time
    pub iat: i64,           // Issued at
    pub jti: String,        // Token id
}

/// Stateless HS256 token verifier.
///
/// Cheap to clone; keys are shared. Signing is only compiled in for tests
/// (`test-utils` feature), the service never hands tokens out.
#[derive(Clone)]
pub struct JwtAuth {
    decoding: Arc<DecodingKey>,
    #[cfg(any(test, feature = "test-utils"))]
    encoding: Arc<EncodingKey>,
    #[cfg(any(test, feature = "test-utils"))]
    access_ttl_secs: i64,
}

impl JwtAuth {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.as_bytes();

        tracing::info!("JWT auth initialized");
        Self {
            decoding: Arc::new(DecodingKey::from_secret(secret)),
            #[cfg(any(test, feature = "test-utils"))]
            encoding: Arc::new(EncodingKey::from_secret(secret)),
            #[cfg(any(test, feature = "test-utils"))]
            access_ttl_secs: config.access_ttl_secs,
        }
    }

    /// Issue an access token for the given subject
    #[cfg(any(test, feature = "test-utils"))]
    pub fn create_access_token(
        &self,
        sub: &str,
        email: &str,
        name: &str,
        roles: &[String],
    ) -> eyre::Result<String> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: sub.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            roles: roles.to_vec(),
            exp: (now + Duration::seconds(self.access_ttl_secs)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Verify signature and expiry, returning the decoded claims
    pub fn verify_token(&self, token: &str) -> eyre::Result<JwtClaims> {
        let data = decode::<JwtClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }
}
