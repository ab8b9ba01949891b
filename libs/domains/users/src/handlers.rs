use axum::{
    Router,
    body::Bytes,
    extract::{FromRequest, Path, Query, Request, State, rejection::QueryRejection},
    response::Response,
    routing::get,
};
use serde_json::Value;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::actor::Actor;
use crate::envelope::Envelope;
use crate::error::{UserError, UserResult};
use crate::format::Format;
use crate::messages;
use crate::models::{CreateUser, PageQuery, UpdateUser, UserPage, UserResponse, UserStatus};
use crate::repository::UserRepository;
use crate::rules::FieldMap;
use crate::service::UserService;

/// OpenAPI tag for user endpoints
pub const TAG: &str = "users";

/// Mount point of [`router`] below the API prefix
pub const URL: &str = "/users";

/// OpenAPI documentation for Users API
#[derive(OpenApi)]
#[openapi(
    paths(list_users, create_user, get_user, update_user, patch_user, delete_user),
    components(schemas(Envelope, UserPage, UserResponse, CreateUser, UpdateUser, UserStatus)),
    tags((name = TAG, description = "User management endpoints"))
)]
pub struct ApiDoc;

/// Create the users router with all HTTP endpoints
pub fn router<R: UserRepository + 'static>(service: UserService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{uid}",
            get(get_user)
                .put(update_user)
                .patch(patch_user)
                .delete(delete_user),
        )
        .with_state(shared_service)
}

/// Raw JSON object body.
///
/// An empty body counts as `{}`. Anything that is not a JSON object is
/// rejected with a 400 envelope in the negotiated format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(pub FieldMap);

impl<S> FromRequest<S> for Fields
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let format = Format::from_headers(req.headers());

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| format.error(UserError::MalformedBody(e.body_text())))?;

        parse_fields(&bytes)
            .map(Fields)
            .map_err(|e| format.error(e))
    }
}

fn parse_fields(bytes: &[u8]) -> UserResult<FieldMap> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(FieldMap::new());
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(UserError::MalformedBody("expected a JSON object".into())),
        Err(e) => Err(UserError::MalformedBody(e.to_string())),
    }
}

/// List visible users (administrators only)
#[utoipa::path(
    get,
    path = "",
    tag = TAG,
    params(PageQuery),
    responses(
        (status = 200, description = "Page of users in `users`", body = Envelope),
        (status = 401, description = "Missing or invalid token", body = Envelope),
        (status = 403, description = "Caller is not an administrator", body = Envelope),
        (status = 500, description = "Store failure", body = Envelope)
    )
)]
async fn list_users<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    format: Format,
    actor: Actor,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Response {
    // Unparseable queries fall back to the defaults like any other bad value
    let query = query.map(|Query(q)| q).unwrap_or_default();

    let result = service
        .list(&actor, query)
        .await
        .map(|page| Envelope::success("").with_users(page));
    format.reply(result)
}

/// Create a user
#[utoipa::path(
    post,
    path = "",
    tag = TAG,
    request_body = CreateUser,
    responses(
        (status = 200, description = "User created", body = Envelope),
        (status = 400, description = "Validation failed; see `errFor`", body = Envelope),
        (status = 401, description = "Missing or invalid token", body = Envelope),
        (status = 500, description = "Store failure", body = Envelope)
    )
)]
async fn create_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    format: Format,
    actor: Actor,
    Fields(data): Fields,
) -> Response {
    let result = service
        .create(&actor, data)
        .await
        .map(|_| Envelope::success(messages::CREATED));
    format.reply(result)
}

/// Get a user and its role names
#[utoipa::path(
    get,
    path = "/{uid}",
    tag = TAG,
    params(
        ("uid" = String, Path, description = "32-character user identifier")
    ),
    responses(
        (status = 200, description = "User in `user`, role names in `roles`", body = Envelope),
        (status = 400, description = "Malformed identifier", body = Envelope),
        (status = 401, description = "Missing or invalid token", body = Envelope),
        (status = 403, description = "Not allowed to read this user", body = Envelope),
        (status = 404, description = "No visible user", body = Envelope)
    )
)]
async fn get_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    format: Format,
    actor: Actor,
    Path(uid): Path<String>,
) -> Response {
    let result = service
        .read(&actor, &uid)
        .await
        .map(|(user, roles)| Envelope::success("").with_user(user.into(), roles));
    format.reply(result)
}

/// Replace fields of a user
#[utoipa::path(
    put,
    path = "/{uid}",
    tag = TAG,
    params(
        ("uid" = String, Path, description = "32-character user identifier")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = Envelope),
        (status = 400, description = "Malformed identifier or validation failed", body = Envelope),
        (status = 401, description = "Missing or invalid token", body = Envelope),
        (status = 403, description = "Not allowed to update this user", body = Envelope),
        (status = 404, description = "No visible user", body = Envelope),
        (status = 500, description = "Store failure", body = Envelope)
    )
)]
async fn update_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    format: Format,
    actor: Actor,
    Path(uid): Path<String>,
    Fields(data): Fields,
) -> Response {
    let result = service
        .update(&actor, &uid, data)
        .await
        .map(|_| Envelope::success(messages::UPDATED));
    format.reply(result)
}

/// Partially update a user; same semantics as PUT
#[utoipa::path(
    patch,
    path = "/{uid}",
    tag = TAG,
    params(
        ("uid" = String, Path, description = "32-character user identifier")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = Envelope),
        (status = 400, description = "Malformed identifier or validation failed", body = Envelope),
        (status = 403, description = "Not allowed to update this user", body = Envelope),
        (status = 404, description = "No visible user", body = Envelope),
        (status = 500, description = "Store failure", body = Envelope)
    )
)]
async fn patch_user<R: UserRepository>(
    state: State<Arc<UserService<R>>>,
    format: Format,
    actor: Actor,
    path: Path<String>,
    fields: Fields,
) -> Response {
    update_user(state, format, actor, path, fields).await
}

/// Soft-delete a user (administrators only)
#[utoipa::path(
    delete,
    path = "/{uid}",
    tag = TAG,
    params(
        ("uid" = String, Path, description = "32-character user identifier")
    ),
    responses(
        (status = 200, description = "User deleted", body = Envelope),
        (status = 400, description = "Malformed identifier", body = Envelope),
        (status = 401, description = "Missing or invalid token", body = Envelope),
        (status = 403, description = "Caller is not an administrator", body = Envelope),
        (status = 404, description = "No visible user", body = Envelope),
        (status = 500, description = "Store failure", body = Envelope)
    )
)]
async fn delete_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    format: Format,
    actor: Actor,
    Path(uid): Path<String>,
) -> Response {
    let result = service
        .delete(&actor, &uid)
        .await
        .map(|_| Envelope::success(messages::DELETED));
    format.reply(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_is_empty_object() {
        assert!(parse_fields(b"").unwrap().is_empty());
        assert!(parse_fields(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_object_body() {
        let map = parse_fields(br#"{"name": "Ann", "roles": ["admin"]}"#).unwrap();
        assert_eq!(map["name"], "Ann");
        assert!(map["roles"].is_array());
    }

    #[test]
    fn test_non_object_bodies_are_malformed() {
        for body in [&b"[1, 2]"[..], b"\"text\"", b"{\"name\": ", b"null"] {
            let err = parse_fields(body).unwrap_err();
            assert!(matches!(err, UserError::MalformedBody(_)), "{body:?}");
        }
    }
}
