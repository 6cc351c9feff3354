use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use repogpt_index::{ErrorKind, IndexError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Error payload returned by the API routes: `{"success": false, "error": ...}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }
}

pub(crate) fn status_for(err: &IndexError) -> StatusCode {
    match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::ExternalService if err.upstream_status() == Some(404) => StatusCode::NOT_FOUND,
        ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Storage | ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn public_message(err: &IndexError) -> String {
    match err.kind() {
        ErrorKind::Validation => err.to_string(),
        ErrorKind::Authentication => "source host authentication failed".into(),
        ErrorKind::ExternalService if err.upstream_status() == Some(404) => {
            "repository or file not found".into()
        }
        ErrorKind::ExternalService => "upstream service request failed".into(),
        ErrorKind::Timeout => "the model did not respond in time".into(),
        ErrorKind::Storage => "failed to access the embedding store".into(),
        ErrorKind::Configuration => "server is missing required configuration".into(),
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "request failed: {err}");
        } else {
            tracing::warn!(status = status.as_u16(), "request rejected: {err}");
        }
        Self {
            status,
            message: public_message(&err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn external(status: Option<u16>) -> IndexError {
        IndexError::ExternalService {
            service: "source host",
            status,
            message: "secret upstream body".into(),
        }
    }

    #[test]
    fn maps_kinds_to_status() {
        let cases = [
            (IndexError::Validation("x".into()), 400),
            (IndexError::Authentication("x".into()), 401),
            (external(Some(500)), 502),
            (external(None), 502),
            (external(Some(404)), 404),
            (IndexError::Timeout(Duration::from_secs(30)), 504),
            (IndexError::Storage("x".into()), 500),
            (IndexError::Configuration("x".into()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err).as_u16(), expected, "{err}");
        }
    }

    #[test]
    fn upstream_detail_is_not_exposed() {
        let api = ApiError::from(external(Some(500)));
        assert_eq!(api.status(), StatusCode::BAD_GATEWAY);
        assert!(!api.message.contains("secret"));
    }

    #[test]
    fn validation_message_is_kept() {
        let api = ApiError::from(IndexError::Validation("owner must not be empty".into()));
        assert!(api.message.contains("owner must not be empty"));
    }
}
