use std::sync::Arc;

use thiserror::Error;

/// Result type used throughout the SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the Hyphen SDK.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A configured horizon URL could not be parsed.
    #[error("invalid horizon url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The public key cannot be sent as a header value.
    #[error("invalid public key")]
    InvalidApiKey,

    /// Client options failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    /// Transport-level failure (DNS, connection, timeout).
    #[error(transparent)]
    // reqwest::Error is not clonable, so we're wrapping it in an Arc.
    Network(Arc<reqwest::Error>),

    /// The server answered with a non-2xx status.
    #[error("received {status} from {url}")]
    UnexpectedStatus {
        /// URL of the failed request.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// There was no endpoint to send the request to.
    #[error("all horizon endpoints failed")]
    NoEndpoints,

    /// The response body did not have the expected shape.
    #[error("failed to parse evaluation response")]
    ResponseParse(#[source] Arc<serde_json::Error>),

    /// The requested toggle is not part of the evaluation response.
    #[error("toggle not found")]
    FlagNotFound,

    /// The toggle has a different type than requested.
    #[error("toggle type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type.
        expected: &'static str,
        /// Type declared by the server.
        found: &'static str,
    },

    /// The server reported an error for this toggle.
    #[error("toggle evaluation error: {0}")]
    FlagError(String),

    /// An object toggle carried a string that is not valid JSON.
    #[error("failed to parse object toggle value")]
    ObjectParse(#[source] Arc<serde_json::Error>),

    /// Indicates that the telemetry thread panicked. This should normally never happen.
    #[error("telemetry thread panicked")]
    TelemetryThreadPanicked,

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}
