//! HTTP response building module
//!
//! Handlers return an `ApiResponse`; `into_hyper` turns it into the wire
//! response and is the only place that touches hyper's builder.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::error::ApiError;

pub const JSON: &str = "application/json";
pub const TEXT: &str = "text/plain";

/// Structured handler result
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl ApiResponse {
    /// Serialize `body` as JSON
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => Self {
                status,
                content_type: Some(JSON),
                headers: Vec::new(),
                body: Bytes::from(bytes),
            },
            Err(e) => {
                crate::logger::log_error(&format!("Failed to serialize response: {e}"));
                Self::message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }

    /// `{"message": ...}`
    pub fn message(status: StatusCode, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "message": message }))
    }

    pub fn text(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            content_type: Some(TEXT),
            headers: Vec::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub const fn empty(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Plain-text 404 for paths no resource claims
    pub fn path_not_found() -> Self {
        Self::text(StatusCode::NOT_FOUND, "404 Not Found")
    }

    /// Error body for the client. 5xx details are logged, not returned.
    pub fn from_error(err: &ApiError) -> Self {
        if err.status().is_server_error() {
            crate::logger::log_error(&err.to_string());
        }
        let response = Self::message(err.status(), &err.client_message());
        match err {
            ApiError::MethodNotAllowed { allow, .. } => response.with_header("Allow", *allow),
            _ => response,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Build the hyper response
    pub fn into_hyper(self, server_name: &str, enable_cors: bool) -> Response<Full<Bytes>> {
        let status = self.status;
        let mut builder = Response::builder()
            .status(status)
            .header("Server", server_name)
            .header("Content-Length", self.body.len());

        if let Some(content_type) = self.content_type {
            builder = builder.header("Content-Type", content_type);
        }
        if enable_cors {
            builder = builder.header("Access-Control-Allow-Origin", "*");
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        builder.body(Full::new(self.body)).unwrap_or_else(|e| {
            log_build_error(status, &e);
            let mut fallback = Response::new(Full::new(Bytes::from("Internal server error")));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

/// Log response build error
fn log_build_error(status: StatusCode, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response_headers() {
        let response = ApiResponse::json(StatusCode::CREATED, &serde_json::json!({"id": 1}))
            .into_hyper("crud-server/test", false);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], JSON);
        assert_eq!(response.headers()["content-length"], "8");
        assert_eq!(response.headers()["server"], "crud-server/test");
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[test]
    fn test_method_not_allowed_has_allow_header() {
        let err = ApiError::MethodNotAllowed {
            method: "PATCH".into(),
            allow: "GET, POST",
        };
        let response = ApiResponse::from_error(&err);
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(&response.body[..], br#"{"message":"PATCH not allowed"}"#);
        assert!(response
            .headers
            .contains(&("Allow", "GET, POST".to_string())));
    }

    #[test]
    fn test_cors_header() {
        let response = ApiResponse::empty(StatusCode::NO_CONTENT).into_hyper("s", true);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(response.headers().get("content-type").is_none());
    }
}
