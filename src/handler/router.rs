//! Request routing dispatch module
//!
//! Maps (method, path) onto a collection operation. Every failure becomes a
//! response here; nothing propagates past `dispatch`.

use hyper::{Method, StatusCode};

use super::resource;
use crate::config::AppState;
use crate::error::ApiError;
use crate::http::{ApiRequest, ApiResponse};
use crate::logger;
use crate::routing::match_route;
use crate::store::{Collection, RecordId};

const COLLECTION_METHODS: &str = "GET, POST, PUT, OPTIONS";
const ITEM_METHODS: &str = "GET, PUT, DELETE, OPTIONS";

/// Route a buffered request and produce its response
pub async fn dispatch(req: &ApiRequest, state: &AppState) -> ApiResponse {
    if let Some(resp) = health_check(req, state).await {
        return resp;
    }

    let routes = state.registry.routes();
    let Some(route) = match_route(&req.path, &routes) else {
        return ApiResponse::path_not_found();
    };
    let collection = &state.registry.collections()[route.index];

    let result = match route.id {
        None => collection_route(req, collection).await,
        Some(segment) => item_route(req, collection, segment).await,
    };

    result.unwrap_or_else(|err| {
        if !err.status().is_server_error() {
            logger::log_debug(&format!("{} {} rejected: {err}", req.method, req.path));
        }
        ApiResponse::from_error(&err)
    })
}

/// `/<resource>`
async fn collection_route(
    req: &ApiRequest,
    collection: &Collection,
) -> Result<ApiResponse, ApiError> {
    match req.method {
        Method::GET => Ok(resource::list(collection).await),
        Method::POST => resource::create(collection, &req.body).await,
        Method::PUT => resource::replace(collection, None, &req.body).await,
        Method::OPTIONS => Ok(options_response(COLLECTION_METHODS)),
        _ => Err(not_allowed(&req.method, COLLECTION_METHODS)),
    }
}

/// `/<resource>/<id>`
async fn item_route(
    req: &ApiRequest,
    collection: &Collection,
    segment: &str,
) -> Result<ApiResponse, ApiError> {
    // Method is checked before the id so a bad method on a bad id is still 405
    if !matches!(
        req.method,
        Method::GET | Method::PUT | Method::DELETE | Method::OPTIONS
    ) {
        return Err(not_allowed(&req.method, ITEM_METHODS));
    }
    if req.method == Method::OPTIONS {
        return Ok(options_response(ITEM_METHODS));
    }

    let id = RecordId::parse_segment(segment, collection.schema().id_policy)?;
    match req.method {
        Method::GET => resource::get(collection, &id).await,
        Method::PUT => resource::replace(collection, Some(&id), &req.body).await,
        _ => resource::remove(collection, &id).await,
    }
}

fn not_allowed(method: &Method, allow: &'static str) -> ApiError {
    ApiError::MethodNotAllowed {
        method: method.to_string(),
        allow,
    }
}

/// Preflight / capability response
fn options_response(allow: &'static str) -> ApiResponse {
    ApiResponse::empty(StatusCode::NO_CONTENT)
        .with_header("Allow", allow)
        .with_header("Access-Control-Allow-Methods", allow)
        .with_header("Access-Control-Allow-Headers", "Content-Type")
        .with_header("Access-Control-Max-Age", "86400")
}

/// Liveness always answers; readiness also pings the storage backend
async fn health_check(req: &ApiRequest, state: &AppState) -> Option<ApiResponse> {
    let health = &state.config.health;
    if !health.enabled || req.method != Method::GET {
        return None;
    }

    if req.path == health.liveness_path {
        return Some(ApiResponse::json(
            StatusCode::OK,
            &serde_json::json!({ "status": "ok" }),
        ));
    }
    if req.path == health.readiness_path {
        return Some(match state.backend.ping().await {
            Ok(()) => ApiResponse::json(
                StatusCode::OK,
                &serde_json::json!({ "status": "ok", "storage": state.backend.name() }),
            ),
            Err(e) => {
                logger::log_warning(&format!("Readiness check failed: {e}"));
                ApiResponse::json(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &serde_json::json!({ "status": "unavailable", "storage": state.backend.name() }),
                )
            }
        });
    }
    None
}
