//! Request handler module
//!
//! Buffers the request body, dispatches to the resource handlers and writes
//! the access log line.

pub mod resource;
pub mod router;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppState;
use crate::http::{self, ApiRequest, ApiResponse};
use crate::logger::{self, AccessLogEntry};

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    let mut api_req = ApiRequest::new(parts.method, parts.uri.path());
    api_req.query = parts.uri.query().map(ToString::to_string);
    api_req.headers = parts.headers;

    let response = match buffer_body(&mut api_req, body, &state).await {
        Ok(()) => router::dispatch(&api_req, &state).await,
        Err(err) => ApiResponse::from_error(&err),
    };

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::new(
            peer.ip().to_string(),
            api_req.method.to_string(),
            api_req.path.clone(),
        );
        entry.query.clone_from(&api_req.query);
        entry.http_version = version_label(parts.version).to_string();
        entry.status = response.status.as_u16();
        entry.body_bytes = response.body.len();
        entry.referer = api_req.header("referer").map(ToString::to_string);
        entry.user_agent = api_req.header("user-agent").map(ToString::to_string);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    let http_config = &state.config.http;
    Ok(response.into_hyper(&http_config.server_name, http_config.enable_cors))
}

/// Read the body for methods that carry one; others leave it empty
async fn buffer_body(
    api_req: &mut ApiRequest,
    body: Incoming,
    state: &AppState,
) -> Result<(), crate::error::ApiError> {
    if !http::carries_body(&api_req.method) {
        return Ok(());
    }
    let max_body_size = state.config.http.max_body_size;
    http::check_content_length(&api_req.headers, max_body_size)?;
    let timeout = Duration::from_secs(state.config.performance.read_timeout);
    api_req.body = http::read_body(body, max_body_size, timeout).await?;
    Ok(())
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
