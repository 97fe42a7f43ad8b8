//! Pass-through forwarding.
//!
//! # Responsibilities
//! - Relay any request that is not an intercepted upload
//! - Preserve method, path, query, end-to-end headers and body
//! - Stream the upstream response back as received
//!
//! # Design Decisions
//! - Bodies are never buffered: the inbound `Body` is handed to hyper as-is,
//!   and the upstream body is wrapped, not collected
//! - No retries; an upstream transport error is the caller's 502

use std::str::FromStr;

use axum::body::Body;
use axum::http::{Request, Response, Uri};
use thiserror::Error;

use crate::http::headers::{passthrough_request_headers, strip_hop_by_hop};
use crate::http::upstream::{target_url, PassThroughClient};

/// Errors raised before a response from upstream is available.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream uri '{0}'")]
    InvalidUri(String),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
}

/// Forward `request` to `base` and return the upstream response.
pub async fn forward(
    client: &PassThroughClient,
    base: &str,
    request: Request<Body>,
) -> Result<Response<Body>, ForwardError> {
    let (parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = target_url(base, path_and_query);
    let uri = Uri::from_str(&target).map_err(|_| ForwardError::InvalidUri(target.clone()))?;

    let mut upstream_request = Request::builder()
        .method(parts.method)
        .uri(uri)
        .body(body)
        .map_err(|_| ForwardError::InvalidUri(target.clone()))?;
    *upstream_request.headers_mut() = passthrough_request_headers(&parts.headers);

    let response = client.request(upstream_request).await?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}
