//! API route handlers
//!
//! - `recipes`: the native HTTP/JSON recipe API (add, get by name, search)

pub mod recipes;

use axum::http::StatusCode;

/// 404 for routes the API does not define. Like every other route it sits
/// behind authentication.
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
