use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A refresh elsewhere ended the session while this request was in flight.
    #[error("session expired")]
    SessionExpired,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Network(e) => e.status(),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
