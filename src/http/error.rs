//! Mapping of lookup failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::newsletter::ResolveError;

#[derive(Debug)]
enum Failure {
    Resolve(ResolveError),
    /// A body, query or path the extractors refused.
    Rejected { status: StatusCode, message: String },
}

/// A request failure, rendered as `{"error": .., "debug": ..}`.
#[derive(Debug)]
pub struct ApiError {
    failure: Failure,
    expose_debug: bool,
}

impl ApiError {
    pub fn new(error: ResolveError, expose_debug: bool) -> Self {
        Self {
            failure: Failure::Resolve(error),
            expose_debug,
        }
    }

    /// An extractor rejection, keeping the status axum chose for it.
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            failure: Failure::Rejected {
                status,
                message: message.into(),
            },
            expose_debug: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.failure {
            Failure::Rejected { status, .. } => *status,
            Failure::Resolve(error) => match error {
                ResolveError::MissingId | ResolveError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                ResolveError::NotFound(_) => StatusCode::NOT_FOUND,
                ResolveError::Conflict(_) => StatusCode::CONFLICT,
                ResolveError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> Value {
        match &self.failure {
            Failure::Resolve(ResolveError::Store { attempted, source }) => {
                let mut body = json!({ "error": "Failed to read from the newsletter store" });
                if self.expose_debug {
                    body["debug"] = json!({
                        "detail": source.to_string(),
                        "attemptedKeys": attempted,
                    });
                }
                body
            }
            Failure::Resolve(other) => json!({ "error": other.to_string() }),
            Failure::Rejected { message, .. } => json!({ "error": message }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.failure {
            Failure::Resolve(error) if status.is_server_error() => {
                tracing::error!(error = %error, "Request failed");
            }
            Failure::Rejected { message, .. } => {
                tracing::debug!(status = status.as_u16(), message = %message, "Request rejected");
            }
            _ => {}
        }
        (status, Json(self.body())).into_response()
    }
}
