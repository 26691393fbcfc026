use serde_json::{Map, Value};
use thiserror::Error;

/// Message used when a failure carries no structured body to explain it.
pub const CONNECTIVITY_MESSAGE: &str =
    "Unable to reach the server. Please check your connection and try again.";

/// Broad failure categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 401 that was not (or could not be) recovered by a refresh
    TransientAuth,
    /// Refresh failed; the session is gone
    TerminalAuth,
    /// Structured field errors
    Validation,
    /// Action rejected because of the resource's current status
    StateConflict,
    /// No usable response: transport failure, timeout, or an empty body
    Network,
    /// Any other HTTP error whose body carried a readable message
    Http,
    /// The caller cancelled the request
    Cancelled,
    /// Local encoding, decoding, storage or configuration problem
    Client,
}

/// Main error type for API operations
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 returned by the backend
    #[error("{message}")]
    Unauthorized { message: String },

    /// Token refresh failed and the stored session was dropped
    #[error("{source}")]
    SessionExpired {
        #[source]
        source: Box<ApiError>,
    },

    /// Refresh requested without a stored refresh token
    #[error("no refresh token available")]
    NoRefreshToken,

    /// Validation errors from the backend
    #[error("{message}")]
    Validation {
        message: String,
        status: u16,
        fields: Map<String, Value>,
    },

    /// 403 referencing the resource's current status
    #[error("{message}")]
    StateConflict {
        message: String,
        current_status: String,
    },

    /// Any other HTTP error with a readable body
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Transport failure or a response without a structured body
    #[error("{message}")]
    Network {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request cancelled through its cancel token
    #[error("request cancelled")]
    Cancelled,

    /// Request building error
    #[error("failed to build request: {0}")]
    RequestBuild(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Credential storage error
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Create a network error, optionally keeping the underlying cause
    pub fn network(
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ApiError::Network {
            message: CONNECTIVITY_MESSAGE.to_string(),
            status,
            source,
        }
    }

    /// The single human-readable message for display
    pub fn message(&self) -> String {
        match self {
            ApiError::SessionExpired { source } => source.message(),
            other => other.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized { .. } => ErrorKind::TransientAuth,
            ApiError::SessionExpired { .. } | ApiError::NoRefreshToken => ErrorKind::TerminalAuth,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::StateConflict { .. } => ErrorKind::StateConflict,
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Http { .. } => ErrorKind::Http,
            ApiError::Cancelled => ErrorKind::Cancelled,
            ApiError::RequestBuild(_)
            | ApiError::Json(_)
            | ApiError::Reqwest(_)
            | ApiError::UrlParse(_)
            | ApiError::Io(_) => ErrorKind::Client,
        }
    }

    /// Get the HTTP status code if the backend answered
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::StateConflict { .. } => Some(403),
            ApiError::Validation { status, .. } | ApiError::Http { status, .. } => Some(*status),
            ApiError::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if the caller should send the user back to login
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired { .. })
    }

    /// Field errors, when the backend returned a field-keyed payload
    pub fn field_errors(&self) -> Option<&Map<String, Value>> {
        match self {
            ApiError::Validation { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
