use crate::services::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub const INVALID_EVENT: &str = "Invalid event format";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// The only two failure kinds an operation reports to its caller.
///
/// The message is what the caller sees. Diagnostic detail belongs in the log,
/// so the shortcuts below use fixed, generic messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    /// Malformed or missing required input. Never worth retrying as-is.
    #[error("{0}")]
    BadRequest(String),

    /// Any downstream failure. The caller or the event source may retry.
    #[error("{0}")]
    InternalError(String),
}

impl AppError {
    /// Shortcut for a 400 with the generic invalid-event message.
    pub fn bad_request() -> Self {
        Self::BadRequest(INVALID_EVENT.into())
    }

    /// Shortcut for a 500 with the generic message.
    pub fn internal() -> Self {
        Self::InternalError(INTERNAL_ERROR.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Raw object routes talk to the store directly, so they get a richer mapping
/// than the two pipeline kinds.
impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::InvalidBucketName { .. } | StoreError::InvalidObjectKey => {
                StatusCode::BAD_REQUEST
            }
            StoreError::ObjectNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            tracing::error!("object store failure: {}", self);
            INTERNAL_ERROR.to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn app_errors_map_to_their_status() {
        assert_eq!(AppError::bad_request().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::internal().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::bad_request().to_string(), INVALID_EVENT);
    }

    #[test]
    fn store_errors_hide_internal_detail() {
        let resp = StoreError::Io(io::Error::other("disk on fire")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = StoreError::ObjectNotFound {
            bucket: "photos".into(),
            key: "a.jpg".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = StoreError::InvalidObjectKey.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
