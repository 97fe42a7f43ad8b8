//! Request matching conditions.
//!
//! # Design Decisions
//! - Path matching is exact and case-sensitive
//! - Content type matching ignores case and parameters (boundary, charset)
//! - Conditions combine with AND semantics

use axum::body::Body;
use axum::http::{header, Method, Request};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.method() == self.method
    }
}

/// Matches when the path equals one of a set of paths.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    paths: Vec<String>,
}

impl ExactPathMatcher {
    pub fn new(paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        let path = req.uri().path();
        self.paths.iter().any(|p| p == path)
    }
}

/// Matches the media type of the Content-Type header.
#[derive(Debug, Clone)]
pub struct ContentTypeMatcher {
    media_type: String,
}

impl ContentTypeMatcher {
    /// The media type is normalized to lowercase.
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into().to_ascii_lowercase(),
        }
    }

    pub fn multipart_form_data() -> Self {
        Self::new("multipart/form-data")
    }
}

impl Matcher for ContentTypeMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(';').next())
            .map(|mt| mt.trim().eq_ignore_ascii_case(&self.media_type))
            .unwrap_or(false)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}
