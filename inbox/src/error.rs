//! Error types for the inbox library
//!
//! This module defines error types that:
//! - Are serializable so they can be handed to a UI layer as-is
//! - Keep the server-reported detail of a failed mutation
//! - Map foreign errors (io, toml, json, http) to domain variants

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Library error type
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InboxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The server answered the mutation with a non-success status.
    ///
    /// `detail` is the human-readable message found in the error body, if
    /// any.
    #[error("Server error (HTTP {status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Server { status: u16, detail: Option<String> },

    #[error("Unknown inbox status: {0:?}")]
    UnknownStatus(String),

    #[error("Update request contains no message ids")]
    EmptyRequest,
}

impl InboxError {
    /// Server-reported detail message, if the server sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Server { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

// Serialize as a plain string, the way the UI expects to display it.
impl Serialize for InboxError {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl From<std::io::Error> for InboxError {
    fn from(err: std::io::Error) -> Self {
        InboxError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for InboxError {
    fn from(err: toml::de::Error) -> Self {
        InboxError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for InboxError {
    fn from(err: serde_json::Error) -> Self {
        InboxError::Parse(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for InboxError {
    fn from(err: reqwest::Error) -> Self {
        InboxError::Network(err.to_string())
    }
}

/// Result type alias using InboxError
pub type Result<T> = std::result::Result<T, InboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display_with_detail() {
        let err = InboxError::Server {
            status: 403,
            detail: Some("Permission denied".to_string()),
        };
        assert_eq!(err.to_string(), "Server error (HTTP 403): Permission denied");
        assert_eq!(err.detail(), Some("Permission denied"));
    }

    #[test]
    fn test_server_error_display_without_detail() {
        let err = InboxError::Server {
            status: 500,
            detail: None,
        };
        assert_eq!(err.to_string(), "Server error (HTTP 500): no detail");
        assert_eq!(err.detail(), None);
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&InboxError::EmptyRequest).unwrap();
        assert_eq!(json, "\"Update request contains no message ids\"");
    }
}
