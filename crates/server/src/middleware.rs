//! Request pipeline for the HTTP listeners.
//!
//! Each function wraps the rest of the stack (`next`) and is attached with
//! `axum::middleware::from_fn`. The router applies them in a fixed order,
//! outermost first: request id, tracer, API key auth, content type.

use crate::error::ServerError;
use crate::state::ServerState;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header echoing the request id back to the caller.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id assigned by [`request_id`], stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// API Key authentication middleware
///
/// A request is let through only if its first `X-Api-Key` header equals the
/// configured key. Anything else is answered with 401 before the handler (and
/// so the store) is ever reached.
pub async fn api_key_auth(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    // Only the first header counts; later ones cannot rescue a wrong key.
    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| state.is_valid_api_key(key));

    if !authorized {
        return Err(ServerError::Authentication(
            "missing or invalid API key".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Call tracer
///
/// Times everything beneath it, whether it succeeds or fails, and logs the
/// duration under the call's logical name (`"<method> <uri>"`).
pub async fn trace_requests(request: Request, next: Next) -> Response {
    let operation = format!("{} {}", request.method(), request.uri());
    let start = std::time::Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        operation = %operation,
        status = %response.status(),
        duration_ms = %duration.as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}

/// Marks every response as JSON, whatever the handler produced.
pub async fn json_content_type(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
