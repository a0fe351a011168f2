//! Error types for vCD operations.
//!
//! This module provides the error type shared by all vCD crates, including the
//! structured error document the platform returns on `400 Bad Request`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for vCD operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Service is unavailable (connection refused, DNS failure, ...)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timeout waiting for service: {0}")]
    Timeout(String),

    /// Invalid request, rejected locally before any network call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Bad request without a decodable error document
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid endpoint or request path
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Failed to encode an XML payload
    #[error("Error marshalling XML data: {0}")]
    XmlEncode(String),

    /// Failed to decode an XML response body
    #[error("Error decoding response: {0}")]
    XmlDecode(String),

    /// Structured error document returned by the platform
    #[error("API error: {0}")]
    Api(ApiError),

    /// Status code the calling operation does not handle
    #[error("{context}, API response is: {status_text}")]
    UnexpectedStatus {
        /// What the caller was trying to do
        context: String,
        /// Numeric HTTP status
        status: u16,
        /// Literal status line, e.g. `412 Precondition Failed`
        status_text: String,
    },

    /// A conditional write was attempted without a concurrency token
    #[error("Missing concurrency token: {0}")]
    MissingConcurrencyToken(String),
}

/// Specialized result type for vCD operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error document returned in the body of a `400 Bad Request`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "error")]
pub struct ApiError {
    /// Platform error code
    #[serde(rename = "errorCode", default)]
    pub error_code: String,
    /// Human-readable details
    #[serde(default)]
    pub details: String,
    /// Backend module that raised the error
    #[serde(rename = "moduleName", default)]
    pub module_name: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error_code, self.details)?;
        if !self.module_name.is_empty() {
            write!(f, " (module {})", self.module_name)?;
        }
        Ok(())
    }
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::XmlEncode(_) => "XML_ENCODE_ERROR",
            Self::XmlDecode(_) => "XML_DECODE_ERROR",
            Self::Api(_) => "API_ERROR",
            Self::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            Self::MissingConcurrencyToken(_) => "MISSING_CONCURRENCY_TOKEN",
        }
    }

    /// Build a transport error, keeping the timeout/connect classification of
    /// the underlying [`reqwest::Error`] but carrying a caller-supplied message.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error, message: String) -> Self {
        if err.is_timeout() {
            Self::Timeout(message)
        } else if err.is_connect() {
            Self::ServiceUnavailable(message)
        } else {
            Self::HttpError(message)
        }
    }

    /// Returns true when the backend rejected a conditional write because the
    /// presented concurrency token no longer matches (`412`).
    #[must_use]
    pub const fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { status: 412, .. })
    }

    /// Returns true for failures that never reached the network.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidEndpoint(_)
                | Self::InvalidRequest(_)
                | Self::XmlEncode(_)
                | Self::MissingConcurrencyToken(_)
                | Self::ConfigError(_)
                | Self::ValidationError(_)
        )
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        Self::from_transport(&err, message)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::InvalidEndpoint("test".to_string()).error_code(),
            "INVALID_ENDPOINT"
        );
        assert_eq!(
            Error::XmlDecode("test".to_string()).error_code(),
            "XML_DECODE_ERROR"
        );
        assert_eq!(Error::Api(ApiError::default()).error_code(), "API_ERROR");
        assert_eq!(
            Error::UnexpectedStatus {
                context: "ctx".to_string(),
                status: 500,
                status_text: "500 Internal Server Error".to_string(),
            }
            .error_code(),
            "UNEXPECTED_STATUS"
        );
        assert_eq!(
            Error::MissingConcurrencyToken("test".to_string()).error_code(),
            "MISSING_CONCURRENCY_TOKEN"
        );
    }

    #[test]
    fn test_unexpected_status_display_carries_status_text() {
        let err = Error::UnexpectedStatus {
            context: "Deleting firewall was not successful".to_string(),
            status: 200,
            status_text: "200 OK".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Deleting firewall was not successful, API response is: 200 OK"
        );
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError {
            error_code: "255".to_string(),
            details: "Firewall is not enabled".to_string(),
            module_name: "vsm".to_string(),
        };
        assert_eq!(err.to_string(), "[255] Firewall is not enabled (module vsm)");

        let bare = ApiError {
            error_code: "1".to_string(),
            details: "boom".to_string(),
            module_name: String::new(),
        };
        assert_eq!(Error::from(bare).to_string(), "API error: [1] boom");
    }

    #[test]
    fn test_precondition_failed() {
        let stale = Error::UnexpectedStatus {
            context: "update".to_string(),
            status: 412,
            status_text: "412 Precondition Failed".to_string(),
        };
        assert!(stale.is_precondition_failed());
        assert!(!Error::HttpError("x".to_string()).is_precondition_failed());
    }

    #[test]
    fn test_is_local() {
        assert!(Error::InvalidRequest("x".to_string()).is_local());
        assert!(Error::InvalidEndpoint("x".to_string()).is_local());
        assert!(!Error::HttpError("x".to_string()).is_local());
        assert!(!Error::Api(ApiError::default()).is_local());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let vcd_err: Error = err.into();
        assert!(matches!(vcd_err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_error_partial_eq() {
        let err1 = Error::BadRequest("test".to_string());
        let err2 = Error::BadRequest("test".to_string());
        let err3 = Error::BadRequest("other".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
