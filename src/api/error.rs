//! HTTP-facing errors
//!
//! Every failure is reduced to a status code and a short message. Causes are
//! logged where they happen and never echoed to the client.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors returned to HTTP clients
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Needs HMAC")]
    MissingSignature,

    #[error("403 Forbidden")]
    InvalidSignature,

    #[error("Backend Error")]
    Backend,

    #[error("Storage error")]
    Storage,

    #[error("405 Method Not Allowed")]
    MethodNotAllowed,

    #[error("invalid range: failed to overlap")]
    RangeNotSatisfiable { size: u64 },
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingSignature | ApiError::InvalidSignature => StatusCode::FORBIDDEN,
            ApiError::Backend | ApiError::Storage => StatusCode::BAD_GATEWAY,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status(),
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            format!("{}\n", self),
        )
            .into_response();

        if let ApiError::RangeNotSatisfiable { size } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }

        response
    }
}
