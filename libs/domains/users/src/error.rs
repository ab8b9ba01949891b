use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use thiserror::Error;

use crate::envelope::{Envelope, FieldErrors};
use crate::format::Format;
use crate::messages;

/// Store write that did not persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreOp {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Malformed user identifier")]
    InvalidIdentifier,

    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("User not found")]
    NotFound,

    #[error("Store failed to {0} user")]
    StoreFailed(StoreOp),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Response encoding error: {0}")]
    Format(String),
}

pub type UserResult<T> = Result<T, UserError>;

impl From<DbErr> for UserError {
    fn from(err: DbErr) -> Self {
        UserError::Store(err.to_string())
    }
}

impl UserError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserError::InvalidIdentifier | UserError::Validation(_) | UserError::MalformedBody(_) => {
                StatusCode::BAD_REQUEST
            }
            UserError::Unauthenticated => StatusCode::UNAUTHORIZED,
            UserError::PermissionDenied => StatusCode::FORBIDDEN,
            UserError::NotFound => StatusCode::NOT_FOUND,
            UserError::StoreFailed(_)
            | UserError::Store(_)
            | UserError::PasswordHash(_)
            | UserError::Format(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope sent to the client. Internal details never leave the process.
    pub fn envelope(&self) -> Envelope {
        match self {
            UserError::InvalidIdentifier => Envelope::failure(messages::BAD_REQUEST),
            UserError::Validation(errors) => {
                Envelope::failure(messages::VALIDATION_FAILED).with_errors(errors.clone())
            }
            UserError::MalformedBody(_) => Envelope::failure(messages::MALFORMED_BODY),
            UserError::Unauthenticated => Envelope::failure(messages::UNAUTHORIZED),
            UserError::PermissionDenied => Envelope::failure(messages::FORBIDDEN),
            UserError::NotFound => Envelope::failure(messages::NOT_FOUND),
            UserError::StoreFailed(op) => Envelope::failure(match op {
                StoreOp::Create => messages::CREATE_FAILED,
                StoreOp::Update => messages::UPDATE_FAILED,
                StoreOp::Delete => messages::DELETE_FAILED,
            }),
            UserError::Store(_) | UserError::PasswordHash(_) | UserError::Format(_) => {
                Envelope::failure(messages::INTERNAL_ERROR)
            }
        }
    }

    pub(crate) fn log(&self) {
        let status = self.status().as_u16();
        match self {
            UserError::Validation(errors) => {
                tracing::info!(status, fields = ?errors.keys().collect::<Vec<_>>(), "{}", self)
            }
            UserError::PermissionDenied | UserError::Unauthenticated => {
                tracing::warn!(status, "{}", self)
            }
            _ if self.status().is_server_error() => tracing::error!(status, "{}", self),
            _ => tracing::info!(status, "{}", self),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        Format::Json.error(self)
    }
}
