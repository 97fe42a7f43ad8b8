//! Header handling between client and upstream.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions (RFC 9110 §7.6.1)
//! - Drop `Host` so the upstream client sets the upstream authority
//! - Drop framing headers when the body is re-encoded (multipart re-submission)
//!
//! # Design Decisions
//! - End-to-end headers (auth, API keys, request ID) are forwarded untouched
//! - Headers named in `Connection` are treated as hop-by-hop too

use axum::http::{header, HeaderMap, HeaderName};

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Headers for a pass-through request: everything end-to-end except `Host`.
pub fn passthrough_request_headers(original: &HeaderMap) -> HeaderMap {
    let mut headers = original.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers
}

/// Headers for a re-encoded upload: the body framing is rebuilt upstream-side.
pub fn upload_request_headers(original: &HeaderMap) -> HeaderMap {
    let mut headers = passthrough_request_headers(original);
    headers.remove(header::CONTENT_TYPE);
    headers.remove(header::CONTENT_LENGTH);
    headers
}
