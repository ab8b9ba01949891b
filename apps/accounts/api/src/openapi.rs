use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "Accounts API",
        version = "0.1.0",
        description = "User account management. Responses use the `{errs, errFor, msg, success}` envelope, as JSON or MessagePack."
    ),
    servers(
        (url = "/api", description = "API base path")
    ),
    nest(
        (path = domain_users::handlers::URL, api = domain_users::ApiDoc)
    )
)]
pub struct ApiDoc;
