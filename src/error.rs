//! Error taxonomy shared by the session, the HTTP clients and the post pipeline.

/// Errors surfaced by remote calls and session-gated operations.
///
/// The type is `Clone` so a single in-flight fetch result can be handed to
/// every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request could not be sent, or the remote answered with a non-2xx status.
    #[error("{operation} failed{}: {detail}", status_suffix(.status))]
    Network {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    /// An action needed a token the session does not hold.
    #[error("authentication required: {0}")]
    AuthRequired(&'static str),
    /// The DMA token could not be mapped to a user id.
    #[error("user id resolution failed: {0}")]
    Resolution(String),
    /// The remote answered with a payload we cannot use at all.
    #[error("malformed response: {0}")]
    Validation(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" with HTTP {}", s))
        .unwrap_or_default()
}

impl Error {
    pub fn network(operation: &'static str, detail: impl Into<String>) -> Self {
        Error::Network {
            operation,
            status: None,
            detail: detail.into(),
        }
    }

    /// Network and resolution failures can be retried from the UI; the others
    /// need the user to act (sign in) or are permanent for this payload.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network { .. } | Error::Resolution(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network {
            operation: "request",
            status: e.status().map(|s| s.as_u16()),
            detail: e.to_string(),
        }
    }
}
