use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Every failure the relay can report.
///
/// Upstream failures are split one variant per cause so the HTTP layer can
/// give each a distinct status and message.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The caller sent an invalid or incomplete request.
    #[error("{0}")]
    Validation(String),

    /// An uploaded file does not carry an accepted plain-text extension.
    #[error("unsupported file format '{file_name}'; only {accepted} files are accepted")]
    UnsupportedFileType { file_name: String, accepted: String },

    #[error("schema '{0}' not found")]
    SchemaNotFound(String),

    /// No training log exists for the requested day.
    #[error("no training data for date {date}")]
    TrainingDataNotFound { date: String },

    /// The completion API answered with an empty body.
    #[error("the completion API returned an empty response")]
    UpstreamEmpty,

    /// The completion API answered with a body that is not the expected JSON.
    #[error("invalid response from the completion API (status {status})")]
    UpstreamMalformed { status: u16 },

    /// The completion API reported an error object.
    #[error("completion API error: {message}")]
    UpstreamError { message: String },

    /// The completion API answered without any choices.
    #[error("unexpected response from the completion API: no choices returned")]
    UpstreamNoChoices,

    #[error("timed out waiting for the completion API")]
    UpstreamTimeout,

    #[error("could not connect to the completion API")]
    UpstreamUnreachable,

    /// Any other transport fault while talking to the completion API.
    #[error("completion API request failed: {0}")]
    UpstreamTransport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelayError {
    /// `true` for errors caused by the completion API rather than the caller.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RelayError::UpstreamEmpty
                | RelayError::UpstreamMalformed { .. }
                | RelayError::UpstreamError { .. }
                | RelayError::UpstreamNoChoices
                | RelayError::UpstreamTimeout
                | RelayError::UpstreamUnreachable
                | RelayError::UpstreamTransport(_)
        )
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RelayError::UpstreamTimeout
        } else if e.is_connect() {
            RelayError::UpstreamUnreachable
        } else {
            RelayError::UpstreamTransport(e.to_string())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn malformed_message_carries_status() {
        let e = RelayError::UpstreamMalformed { status: 502 };
        assert!(e.to_string().contains("502"));
    }

    #[test]
    fn upstream_classification() {
        assert!(RelayError::UpstreamTimeout.is_upstream());
        assert!(RelayError::UpstreamNoChoices.is_upstream());
        assert!(!RelayError::Validation("x".into()).is_upstream());
        assert!(!RelayError::SchemaNotFound("x".into()).is_upstream());
    }
}
