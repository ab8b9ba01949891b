//! Response envelope encoders.
//!
//! Users responses are written either as JSON or as MessagePack maps, chosen
//! from the request's `Accept` header. Both encoders implement
//! [`EnvelopeResponse`] and are plain axum responses, so handlers can return
//! either one wherever a response is expected.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::convert::Infallible;
use thiserror::Error;

use crate::envelope::Envelope;
use crate::error::{UserError, UserResult};
use crate::messages;

pub const APPLICATION_MSGPACK: &str = "application/msgpack";
const APPLICATION_X_MSGPACK: &str = "application/x-msgpack";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to encode payload: {0}")]
    Encode(String),

    #[error("failed to decode content: {0}")]
    Decode(String),
}

impl From<FormatError> for UserError {
    fn from(err: FormatError) -> Self {
        UserError::Format(err.to_string())
    }
}

/// A response whose body is an encoded payload that can be swapped and read
/// back.
pub trait EnvelopeResponse: IntoResponse + Sized {
    /// Wrapped representation of the payload
    type Content;

    fn new<T: Serialize + ?Sized>(payload: &T, status: StatusCode) -> Result<Self, FormatError>;

    /// Replace the payload, returning the wrapped representation now stored.
    fn set_data<T: Serialize + ?Sized>(
        &mut self,
        payload: &T,
    ) -> Result<&Self::Content, FormatError>;

    /// Decode the stored content back into a payload.
    fn get_data<T: DeserializeOwned>(&self) -> Result<T, FormatError>;

    fn content(&self) -> &Self::Content;

    fn status(&self) -> StatusCode;
}

/// JSON encoder; content is a `serde_json::Value`
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    content: Value,
    status: StatusCode,
}

impl EnvelopeResponse for JsonResponse {
    type Content = Value;

    fn new<T: Serialize + ?Sized>(payload: &T, status: StatusCode) -> Result<Self, FormatError> {
        let content =
            serde_json::to_value(payload).map_err(|e| FormatError::Encode(e.to_string()))?;
        Ok(Self { content, status })
    }

    fn set_data<T: Serialize + ?Sized>(&mut self, payload: &T) -> Result<&Value, FormatError> {
        self.content =
            serde_json::to_value(payload).map_err(|e| FormatError::Encode(e.to_string()))?;
        Ok(&self.content)
    }

    fn get_data<T: DeserializeOwned>(&self) -> Result<T, FormatError> {
        T::deserialize(&self.content).map_err(|e| FormatError::Decode(e.to_string()))
    }

    fn content(&self) -> &Value {
        &self.content
    }

    fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for JsonResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.content)).into_response()
    }
}

/// MessagePack bytes, structs encoded as string-keyed maps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packed(Vec<u8>);

impl Packed {
    pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Self, FormatError> {
        rmp_serde::to_vec_named(payload)
            .map(Packed)
            .map_err(|e| FormatError::Encode(e.to_string()))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, FormatError> {
        rmp_serde::from_slice(&self.0).map_err(|e| FormatError::Decode(e.to_string()))
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

/// MessagePack encoder served as `application/msgpack`
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePackResponse {
    content: Packed,
    status: StatusCode,
}

impl EnvelopeResponse for MessagePackResponse {
    type Content = Packed;

    fn new<T: Serialize + ?Sized>(payload: &T, status: StatusCode) -> Result<Self, FormatError> {
        Ok(Self {
            content: Packed::encode(payload)?,
            status,
        })
    }

    fn set_data<T: Serialize + ?Sized>(&mut self, payload: &T) -> Result<&Packed, FormatError> {
        self.content = Packed::encode(payload)?;
        Ok(&self.content)
    }

    fn get_data<T: DeserializeOwned>(&self) -> Result<T, FormatError> {
        self.content.decode()
    }

    fn content(&self) -> &Packed {
        &self.content
    }

    fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for MessagePackResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(APPLICATION_MSGPACK),
            )],
            self.content.into_inner(),
        )
            .into_response()
    }
}

/// Negotiated wire format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Json,
    MessagePack,
}

impl Format {
    /// MessagePack when `Accept` lists `application/msgpack` or
    /// `application/x-msgpack`, JSON otherwise.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let wants_msgpack = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|media| media.split(';').next().unwrap_or("").trim())
            .any(|media| {
                media.eq_ignore_ascii_case(APPLICATION_MSGPACK)
                    || media.eq_ignore_ascii_case(APPLICATION_X_MSGPACK)
            });

        if wants_msgpack {
            Format::MessagePack
        } else {
            Format::Json
        }
    }

    /// Encode `payload` with this format.
    pub fn respond<T: Serialize + ?Sized>(self, status: StatusCode, payload: &T) -> Response {
        let encoded = match self {
            Format::Json => JsonResponse::new(payload, status).map(IntoResponse::into_response),
            Format::MessagePack => {
                MessagePackResponse::new(payload, status).map(IntoResponse::into_response)
            }
        };

        encoded.unwrap_or_else(|e| {
            tracing::error!(format = ?self, "{}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "errs": [],
                    "errFor": {},
                    "msg": messages::INTERNAL_ERROR,
                    "success": false
                })),
            )
                .into_response()
        })
    }

    /// 200 with the envelope, or the error's status and envelope.
    pub fn reply(self, result: UserResult<Envelope>) -> Response {
        match result {
            Ok(envelope) => self.respond(StatusCode::OK, &envelope),
            Err(err) => self.error(err),
        }
    }

    pub fn error(self, err: UserError) -> Response {
        err.log();
        self.respond(err.status(), &err.envelope())
    }
}

impl<S> FromRequestParts<S> for Format
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Format::from_headers(&parts.headers))
    }
}
