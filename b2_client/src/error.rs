use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum B2ClientError {
    #[error("{api} api call failed ({status}): {code}: {message}")]
    Api {
        api: &'static str,
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("part {part_number} checksum mismatch: computed {local}, server confirmed {remote}")]
    ChecksumMismatch {
        part_number: u16,
        local: String,
        remote: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request middleware error: {0}")]
    Middleware(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("subtask scheduling error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, B2ClientError>;

impl From<reqwest_middleware::Error> for B2ClientError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => B2ClientError::Network(e),
            reqwest_middleware::Error::Middleware(e) => B2ClientError::Middleware(e.to_string()),
        }
    }
}

impl B2ClientError {
    /// HTTP status associated with the failure, when one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            B2ClientError::Api { status, .. } => Some(*status),
            B2ClientError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// True when the condition is expected to resolve on retry: rate
    /// limiting, request timeout, or temporary unavailability.
    pub fn is_transient(&self) -> bool {
        match self {
            B2ClientError::Network(e) => e.is_timeout() || e.is_connect(),
            B2ClientError::Api { status, .. } => {
                *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || status.is_server_error()
            },
            _ => false,
        }
    }

    /// True when the authorization used for the call is no longer valid.
    /// The lease (or the whole session) must be re-acquired before retrying.
    pub fn is_auth(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}
