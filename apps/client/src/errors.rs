use serde::Serialize;
use thiserror::Error;

/// Client-level error type.
/// Every failure is scoped to the phase that produced it; none is fatal to the process.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed stream fragment {unit:?}: {source}")]
    Protocol {
        unit: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stream ended inside a fragment: {0:?}")]
    TruncatedStream(String),

    #[error("Unexpected data between stream fragments: {0:?}")]
    UnframedData(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job {0} is not in the matched list")]
    UnknownJob(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure taxonomy used when reporting a phase failure to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Protocol,
    Validation,
}

impl ClientError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::Transport(_) | ClientError::Api { .. } | ClientError::Io(_) => {
                FailureKind::Transport
            }
            ClientError::Protocol { .. }
            | ClientError::TruncatedStream(_)
            | ClientError::UnframedData(_) => FailureKind::Protocol,
            ClientError::Validation(_) | ClientError::UnknownJob(_) => FailureKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_classify_as_protocol() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ClientError::Protocol {
            unit: "{".to_string(),
            source,
        };
        assert_eq!(err.kind(), FailureKind::Protocol);
        assert_eq!(
            ClientError::TruncatedStream("{\"chunk\"".to_string()).kind(),
            FailureKind::Protocol
        );
    }

    #[test]
    fn test_api_error_classifies_as_transport() {
        let err = ClientError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.kind(), FailureKind::Transport);
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_validation_errors_classify_as_validation() {
        assert_eq!(
            ClientError::Validation("too short".to_string()).kind(),
            FailureKind::Validation
        );
        assert_eq!(
            ClientError::UnknownJob("42".to_string()).kind(),
            FailureKind::Validation
        );
    }
}
