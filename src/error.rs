//! Unified error types for the share trader
//!
//! Every fallible step of a purchase reports a `TraderError` carrying an
//! `ErrorCode`, so the final outcome can be serialized without losing the
//! failure category.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::abi::AbiError;

/// Main error type for all trader operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    /// HTTP status of the failed response, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl TraderError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            status: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn rpc_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Map a non-success HTTP status to an error code
    pub fn from_status(status: u16, context: &str, body: &str) -> Self {
        let code = match status {
            401 | 403 => ErrorCode::AuthError,
            408 | 504 => ErrorCode::Timeout,
            _ => ErrorCode::HttpStatus,
        };
        let mut err = Self::new(code, format!("{} returned HTTP {}", context, status));
        err.status = Some(status);
        if body.trim().is_empty() {
            err
        } else {
            err.with_details(truncate(body.trim(), 300))
        }
    }

    /// Whether the purchase pipeline may continue past this error
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::NetworkError | ErrorCode::Timeout | ErrorCode::HttpStatus
        )
    }
}

impl fmt::Display for TraderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for TraderError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors
    InvalidInput,
    InvalidAddress,
    InvalidConfig,

    // Authentication errors
    AuthError,

    // Network errors
    NetworkError,
    HttpStatus,
    RpcError,
    Timeout,

    // Trade errors
    QuoteRejected,
    SignatureExpired,
    SponsorshipDenied,
    UserOperationRejected,
    UserOperationFailed,

    // Parse errors
    ParseError,
    JsonError,
    HexError,
    AbiError,

    // Internal
    Internal,
}

/// Result type alias for trader operations
pub type TraderResult<T> = Result<T, TraderError>;

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

// Conversions from common error types

impl From<serde_json::Error> for TraderError {
    fn from(e: serde_json::Error) -> Self {
        TraderError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for TraderError {
    fn from(e: hex::FromHexError) -> Self {
        TraderError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<std::io::Error> for TraderError {
    fn from(e: std::io::Error) -> Self {
        TraderError::new(ErrorCode::Internal, e.to_string())
    }
}

impl From<url::ParseError> for TraderError {
    fn from(e: url::ParseError) -> Self {
        TraderError::new(ErrorCode::InvalidConfig, format!("Invalid URL: {}", e))
    }
}

impl From<AbiError> for TraderError {
    fn from(e: AbiError) -> Self {
        TraderError::new(ErrorCode::AbiError, e.to_string())
    }
}

impl From<reqwest::Error> for TraderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TraderError::new(ErrorCode::Timeout, "Request timed out")
        } else if e.is_connect() {
            TraderError::new(ErrorCode::NetworkError, "Connection failed")
        } else {
            TraderError::new(ErrorCode::NetworkError, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = TraderError::new(ErrorCode::SignatureExpired, "Trade signature expired")
            .with_details("deadline 1700000000");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("signature_expired"));
        assert!(json.contains("Trade signature expired"));
    }

    #[test]
    fn test_from_status_maps_auth() {
        let err = TraderError::from_status(401, "Trading API", "{\"message\":\"Unauthorized\"}");
        assert_eq!(err.code, ErrorCode::AuthError);
        assert!(err.details.unwrap().contains("Unauthorized"));

        let err = TraderError::from_status(500, "Bundler", "");
        assert_eq!(err.code, ErrorCode::HttpStatus);
        assert_eq!(err.status, Some(500));
        assert!(err.details.is_none());
        assert!(err.is_transient());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(400);
        let cut = truncate(&long, 301);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= 304);
    }
}
