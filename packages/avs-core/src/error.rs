//! Centralized error types for the AVS client core library.
//!
//! Defines structured error types using `thiserror`, one per subsystem, all
//! converging on the crate-wide [`AvsError`] via `From` impls.

use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code, stable across versions.
    fn code(&self) -> &'static str;
}

/// Errors from building or parsing multipart/form-data bodies.
#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("response has no boundary in its Content-Type header")]
    MissingBoundary,

    #[error("malformed multipart part: {0}")]
    MalformedPart(String),

    #[error("part is missing a Content-Type header")]
    MissingContentType,

    #[error("JSON metadata part failed to parse: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for MultipartError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingBoundary => "multipart_missing_boundary",
            Self::MalformedPart(_) => "multipart_malformed_part",
            Self::MissingContentType => "multipart_missing_content_type",
            Self::Json(_) => "multipart_json_error",
        }
    }
}

/// Errors from the OAuth2 token lifecycle.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token refresh request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned {0}: {1}")]
    HttpStatus(u16, String),

    #[error("refresh_token is missing from configuration")]
    MissingRefreshToken,
}

impl ErrorCode for TokenError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "token_http_failed",
            Self::HttpStatus(_, _) => "token_http_status",
            Self::MissingRefreshToken => "token_missing_refresh_token",
        }
    }
}

/// Errors from the persistent AVS connection (C3/C4/C5).
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("HTTP request to AVS failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AVS returned {0}: {1}")]
    HttpStatus(u16, String),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("downchannel stream ended")]
    DownchannelClosed,
}

impl ErrorCode for ConnectionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "connection_http_failed",
            Self::HttpStatus(_, _) => "connection_http_status",
            Self::Multipart(_) => "connection_multipart_error",
            Self::DownchannelClosed => "connection_downchannel_closed",
        }
    }
}

/// Errors from alert scheduling.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert token {0} not found")]
    NotFound(String),

    #[error("alert scheduled_time {0} could not be parsed as ISO-8601: {1}")]
    InvalidTime(String, String),
}

impl ErrorCode for AlertError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "alert_not_found",
            Self::InvalidTime(_, _) => "alert_invalid_time",
        }
    }
}

/// Errors from directive dispatch.
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("unsupported namespace/name: {0}.{1}")]
    Unsupported(String, String),

    #[error("directive payload missing required field: {0}")]
    MissingField(String),
}

impl ErrorCode for DirectiveError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unsupported(_, _) => "directive_unsupported",
            Self::MissingField(_) => "directive_missing_field",
        }
    }
}

/// Crate-wide error type for the AVS client core.
#[derive(Debug, Error)]
pub enum AvsError {
    /// Token fetch/refresh failed.
    #[error("auth error: {0}")]
    Auth(#[from] TokenError),

    /// The persistent connection to AVS failed at the transport or HTTP layer.
    #[error("network error: {0}")]
    Network(#[from] ConnectionError),

    /// A protocol-level invariant was violated (bad multipart framing, etc).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A directive could not be dispatched or executed.
    #[error("directive error: {0}")]
    Directive(#[from] DirectiveError),

    /// An alert could not be scheduled, fired, or cancelled.
    #[error("alert error: {0}")]
    Alert(#[from] AlertError),
}

impl AvsError {
    /// Returns a machine-readable error code for logging/metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.code(),
            Self::Network(e) => e.code(),
            Self::Protocol(_) => "protocol_error",
            Self::Directive(e) => e.code(),
            Self::Alert(e) => e.code(),
        }
    }

    /// Whether this error should take down the dialog driver loop, versus
    /// being logged and skipped so the client keeps running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(TokenError::MissingRefreshToken))
    }
}

impl From<MultipartError> for AvsError {
    fn from(err: MultipartError) -> Self {
        Self::Network(ConnectionError::Multipart(err))
    }
}

/// Convenient Result alias for core operations.
pub type AvsResult<T> = Result<T, AvsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_refresh_token_is_fatal() {
        let err = AvsError::Auth(TokenError::MissingRefreshToken);
        assert_eq!(err.code(), "token_missing_refresh_token");
        assert!(err.is_fatal());
    }

    #[test]
    fn directive_unsupported_is_not_fatal() {
        let err = AvsError::Directive(DirectiveError::Unsupported(
            "Speaker".into(),
            "Unknown".into(),
        ));
        assert_eq!(err.code(), "directive_unsupported");
        assert!(!err.is_fatal());
    }
}
