//! Request model and body buffering
//!
//! Handlers never see hyper's streaming body; the connection layer reads it
//! to completion first and hands over an `ApiRequest`.

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{HeaderMap, Method};
use std::time::Duration;

use crate::error::ApiError;

/// Fully buffered request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Methods whose body is read and parsed
pub fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Reject early when the declared Content-Length is over the limit
pub fn check_content_length(headers: &HeaderMap, max_body_size: u64) -> Result<(), ApiError> {
    let declared = headers
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    match declared {
        Some(size) if size > max_body_size => Err(ApiError::PayloadTooLarge),
        _ => Ok(()),
    }
}

/// Read the whole body into memory, bounded by size and time
pub async fn read_body<B>(body: B, max_body_size: u64, timeout: Duration) -> Result<Bytes, ApiError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match tokio::time::timeout(timeout, Limited::new(body, limit).collect()).await {
        Err(_) => Err(ApiError::RequestTimeout),
        Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ApiError::PayloadTooLarge)
        }
        Ok(Err(e)) => Err(ApiError::Validation(format!(
            "Failed to read request body: {e}"
        ))),
        Ok(Ok(collected)) => Ok(collected.to_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let body = Full::new(Bytes::from_static(b"{\"name\":\"A\"}"));
        let bytes = read_body(body, 1024, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&bytes[..], b"{\"name\":\"A\"}");
    }

    #[tokio::test]
    async fn test_read_body_over_limit() {
        let body = Full::new(Bytes::from(vec![b'x'; 64]));
        let err = read_body(body, 16, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge));
    }

    /// A body whose sender never sends anything
    struct Stalled;

    impl Body for Stalled {
        type Data = Bytes;
        type Error = std::convert::Infallible;

        fn poll_frame(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Result<hyper::body::Frame<Bytes>, Self::Error>>> {
            std::task::Poll::Pending
        }
    }

    #[tokio::test]
    async fn test_read_body_times_out() {
        let err = read_body(Stalled, 1024, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RequestTimeout));
        assert_eq!(err.status(), hyper::StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_declared_length_checked() {
        let mut headers = HeaderMap::new();
        headers.insert(hyper::header::CONTENT_LENGTH, "2048".parse().unwrap());
        assert!(check_content_length(&headers, 1024).is_err());
        assert!(check_content_length(&headers, 4096).is_ok());
        assert!(check_content_length(&HeaderMap::new(), 1).is_ok());
    }
}
