use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::Error;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
    retryable: bool,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Maps the error taxonomy onto HTTP. Network/validation failures are the
/// upstream's fault (502), a missing token is 401, and a failed user id
/// resolution asks the client to reconnect (428).
impl From<Error> for HTTPError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::AuthRequired(_) => StatusCode::UNAUTHORIZED,
            Error::Resolution(_) => StatusCode::PRECONDITION_REQUIRED,
            Error::Network { .. } | Error::Validation(_) => StatusCode::BAD_GATEWAY,
        };
        HTTPError {
            status,
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

/// Converts our `HTTPError` into an HTTP response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.message,
            "retryable": self.retryable,
        });
        (self.status, Json(body)).into_response()
    }
}
