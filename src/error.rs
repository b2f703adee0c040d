//! Error types
//!
//! `ApiError` is the request-boundary taxonomy: every handler failure is one of
//! these and maps to exactly one status code. `StorageError` covers the
//! persistence backends and is wrapped by `ApiError::Storage`.

use hyper::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a persistence backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Failures surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body, missing required field, bad identifier
    #[error("{0}")]
    Validation(String),

    /// Record (or path) does not exist
    #[error("{0}")]
    NotFound(String),

    #[error("{method} not allowed")]
    MethodNotAllowed { method: String, allow: &'static str },

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Request timeout")]
    RequestTimeout,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client. Server-side failures get a
    /// generic text; the detail only goes to the error log.
    pub fn client_message(&self) -> String {
        if self.status().is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        let err = ApiError::MethodNotAllowed {
            method: "PATCH".into(),
            allow: "GET",
        };
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.to_string(), "PATCH not allowed");
        assert_eq!(
            ApiError::Storage(StorageError::Corrupt("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = ApiError::Storage(StorageError::Io {
            action: "write",
            path: PathBuf::from("/secret/data.json"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.to_string().contains("/secret/data.json"));

        let err = ApiError::Validation("name is required".into());
        assert_eq!(err.client_message(), "name is required");
    }
}
