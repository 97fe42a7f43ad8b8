//! Clients for the upstream printer API.
//!
//! Two pools share the process:
//! - a hyper client for pass-through, which streams `axum::body::Body` both ways
//! - a reqwest client for re-encoding intercepted uploads as multipart forms

use axum::body::Body;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

pub type PassThroughClient = Client<HttpConnector, Body>;

/// Shared upstream connection pools.
#[derive(Clone)]
pub struct UpstreamClient {
    passthrough: PassThroughClient,
    uploads: reqwest::Client,
}

impl UpstreamClient {
    pub fn new() -> Self {
        let passthrough = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let uploads = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default upload client");
                reqwest::Client::new()
            });

        Self { passthrough, uploads }
    }

    pub fn passthrough(&self) -> &PassThroughClient {
        &self.passthrough
    }

    pub fn uploads(&self) -> &reqwest::Client {
        &self.uploads
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Join the upstream base URL with an inbound path and query.
pub fn target_url(base: &str, path_and_query: &str) -> String {
    let base = base.trim_end_matches('/');
    if path_and_query.starts_with('/') {
        format!("{base}{path_and_query}")
    } else {
        format!("{base}/{path_and_query}")
    }
}
