//! Error types.
//!
//! Two layers exist. Configuration, filesystem and command plumbing use `anyhow` through the
//! crate-wide `Result`. Everything that talks to the remote API uses `ClientError`, which is the
//! single place where transport and authorization failures are classified.

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for session, API client and resource operations.
pub type Res<T> = std::result::Result<T, ClientError>;

/// The message used when the server does not provide one.
pub(crate) const GENERIC_FAILURE: &str = "Request failed";

/// The classified failure of a single logical API action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// There is no usable access token and a refresh could not produce one.
    #[error("Not authenticated, please log in")]
    Unauthenticated,

    /// Authorization failed again after one refresh and retry. The session has been cleared.
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// The server answered with a non-success status, or the request never reached it
    /// (`status` is `None` in that case).
    #[error("{message}")]
    RequestFailed {
        status: Option<u16>,
        message: String,
    },

    /// The response body was not valid JSON or did not have the expected shape.
    #[error("{GENERIC_FAILURE}: unable to parse the response ({0})")]
    ParseFailed(String),

    /// Rejected locally before anything was sent.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl ClientError {
    pub(crate) fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        ClientError::RequestFailed {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ClientError::ValidationFailed(message.into())
    }

    pub(crate) fn parse(e: impl std::fmt::Display) -> Self {
        ClientError::ParseFailed(e.to_string())
    }

    /// True when the user has to log in again to continue.
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Unauthenticated | ClientError::SessionExpired)
    }

    /// The HTTP status that caused a `RequestFailed`, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }
}
