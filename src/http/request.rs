//! Request identification.
//!
//! The ID is assigned by tower-http's request-id layer as early as possible
//! and travels to the upstream with the rest of the headers.

use axum::http::HeaderMap;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID, or `"unknown"` when the layer is not installed.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
