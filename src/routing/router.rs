//! Request classification.
//!
//! Compiled once per configuration snapshot, immutable afterwards.

use axum::body::Body;
use axum::http::{Method, Request};

use crate::config::UploadConfig;
use crate::routing::matcher::{AndMatcher, ContentTypeMatcher, ExactPathMatcher, Matcher, MethodMatcher};

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Multipart POST to an upload path: stage, transform, re-submit.
    Upload,
    /// Everything else: relay verbatim.
    PassThrough,
}

impl Dispatch {
    pub fn label(self) -> &'static str {
        match self {
            Dispatch::Upload => "upload",
            Dispatch::PassThrough => "passthrough",
        }
    }
}

/// Classifies inbound requests. Total: every request gets a [`Dispatch`].
#[derive(Debug)]
pub struct Router {
    upload: AndMatcher,
}

impl Router {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            upload: AndMatcher::new(vec![
                Box::new(MethodMatcher::new(Method::POST)),
                Box::new(ExactPathMatcher::new(config.paths.iter().cloned())),
                Box::new(ContentTypeMatcher::multipart_form_data()),
            ]),
        }
    }

    pub fn classify(&self, req: &Request<Body>) -> Dispatch {
        if self.upload.matches(req) {
            Dispatch::Upload
        } else {
            Dispatch::PassThrough
        }
    }
}
