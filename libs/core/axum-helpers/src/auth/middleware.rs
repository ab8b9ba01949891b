use super::jwt::JwtAuth;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

/// Pull the token from `Authorization: Bearer <token>`, falling back to the
/// `access_token` cookie.
fn extract_token_from_request(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer ").map(|s| s.trim().to_string()))
        .or_else(|| {
            headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(|cookies| {
                    cookies.split(';').find_map(|cookie| {
                        let (name, value) = cookie.trim().split_once('=')?;
                        (name == "access_token").then(|| value.to_string())
                    })
                })
        })
}

/// JWT verification middleware.
///
/// Never rejects on its own: verified claims are inserted into the request
/// extensions and requests without (valid) claims pass through untouched, so
/// the downstream extractor decides how an anonymous caller is answered.
pub async fn optional_jwt_auth_middleware(
    State(auth): State<JwtAuth>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match extract_token_from_request(&headers) {
        Some(token) => match auth.verify_token(&token) {
            Ok(claims) => {
                tracing::debug!(sub = %claims.sub, "JWT verified");
                request.extensions_mut().insert(claims);
            }
            Err(e) => tracing::debug!("JWT verification failed: {}", e),
        },
        None => tracing::debug!("No JWT found in Authorization header or cookie"),
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtClaims, JwtConfig};
    use axum::{Extension, Router, body::Body, http::StatusCode, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn auth() -> JwtAuth {
        JwtAuth::new(&JwtConfig::new("middleware-test-secret-middleware-01"))
    }

    async fn whoami(claims: Option<Extension<JwtClaims>>) -> String {
        claims
            .map(|Extension(c)| c.sub)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn app(auth: JwtAuth) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(axum::middleware::from_fn_with_state(
                auth,
                optional_jwt_auth_middleware,
            ))
    }

    async fn call(auth: JwtAuth, header: Option<(header::HeaderName, String)>) -> String {
        let mut builder = Request::builder().uri("/whoami");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        let response = app(auth)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_bearer_token_inserts_claims() {
        let auth = auth();
        let token = auth
            .create_access_token("uid42", "a@example.com", "A", &[])
            .unwrap();

        let body = call(auth, Some((header::AUTHORIZATION, format!("Bearer {token}")))).await;
        assert_eq!(body, "uid42");
    }

    #[tokio::test]
    async fn test_cookie_token_inserts_claims() {
        let auth = auth();
        let token = auth
            .create_access_token("uid7", "b@example.com", "B", &[])
            .unwrap();

        let cookie = format!("theme=dark; access_token={token}");
        let body = call(auth, Some((header::COOKIE, cookie))).await;
        assert_eq!(body, "uid7");
    }

    #[tokio::test]
    async fn test_invalid_or_missing_token_passes_through_anonymous() {
        let body = call(auth(), Some((header::AUTHORIZATION, "Bearer nope".into()))).await;
        assert_eq!(body, "anonymous");

        let body = call(auth(), None).await;
        assert_eq!(body, "anonymous");
    }

    #[test]
    fn test_extract_token_prefers_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        headers.insert(header::COOKIE, "access_token=xyz".parse().unwrap());
        assert_eq!(extract_token_from_request(&headers).as_deref(), Some("abc"));
    }
}
