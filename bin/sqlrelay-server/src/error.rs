//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON body `{"success": false, "error": "..."}` with a status code
//! chosen by cause.
//!
//! This is an internal tool: internal errors echo their message to the caller
//! instead of hiding it behind a generic string.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sqlrelay_core::RelayError;
use thiserror::Error;
use tracing::{error, warn};

/// All errors that can occur in the sqlrelay-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the relay core (validation, upstream, storage).
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status and caller-facing message for this error.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("internal server error: {m}"),
            ),
            ServerError::Relay(e) => {
                let status = match e {
                    RelayError::Validation(_) | RelayError::UnsupportedFileType { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    RelayError::SchemaNotFound(_) | RelayError::TrainingDataNotFound { .. } => {
                        StatusCode::NOT_FOUND
                    }
                    RelayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
                    RelayError::UpstreamUnreachable => StatusCode::SERVICE_UNAVAILABLE,
                    RelayError::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
                    RelayError::UpstreamEmpty
                    | RelayError::UpstreamMalformed { .. }
                    | RelayError::UpstreamError { .. }
                    | RelayError::UpstreamNoChoices => StatusCode::INTERNAL_SERVER_ERROR,
                    RelayError::Io(_) | RelayError::Serialization(_) => {
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            format!("internal server error: {e}"),
                        );
                    }
                };
                (status, e.to_string())
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (
            status,
            Json(json!({ "success": false, "error": client_message })),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    fn status_of(e: RelayError) -> StatusCode {
        ServerError::from(e).status_and_message().0
    }

    #[test]
    fn upstream_causes_have_distinct_statuses() {
        assert_eq!(status_of(RelayError::UpstreamTimeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_of(RelayError::UpstreamUnreachable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(RelayError::UpstreamTransport("reset".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_of(RelayError::UpstreamEmpty), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(RelayError::UpstreamNoChoices), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_of(RelayError::UpstreamMalformed { status: 502 }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn client_errors() {
        assert_eq!(status_of(RelayError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(RelayError::UnsupportedFileType {
                file_name: "a.csv".into(),
                accepted: ".txt".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(RelayError::TrainingDataNotFound { date: "20200101".into() }),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn internal_messages_are_echoed() {
        let (status, message) = ServerError::Internal("disk full".into()).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(message.contains("disk full"));
    }
}
