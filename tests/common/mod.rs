//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, Multipart, State},
    http::{HeaderMap, Request, Response, StatusCode},
    Router,
};
use preprocess_proxy::config::{ProxyConfig, RuleConfig};
use preprocess_proxy::rules::builtin::PrependLine;
use preprocess_proxy::{HttpServer, Rule, RuleError, RuleLoader, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// One multipart field as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub parts: Vec<RecordedPart>,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

/// A mock printer API that records every request.
///
/// - Non-multipart requests are echoed back (status from `x-mock-status`, default 200).
/// - Multipart requests are parsed into parts and answered with 201 (or `x-mock-status`).
pub struct MockUpstream {
    pub addr: SocketAddr,
    log: Log,
}

impl MockUpstream {
    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

pub async fn start_mock_upstream() -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::default();

    let app = Router::new()
        .fallback(mock_handler)
        .with_state(log.clone())
        .layer(DefaultBodyLimit::disable());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream { addr, log }
}

async fn mock_handler(State(log): State<Log>, request: Request<Body>) -> Response<Body> {
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let headers = request.headers().clone();
    let forced_status = headers
        .get("x-mock-status")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u16>().ok());
    let is_multipart = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let (status, body, parts) = if is_multipart {
        let mut multipart = Multipart::from_request(request, &()).await.unwrap();
        let mut parts = Vec::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            parts.push(RecordedPart {
                name: field.name().unwrap_or_default().to_string(),
                file_name: field.file_name().map(str::to_string),
                content_type: field.content_type().map(str::to_string),
                data: field.bytes().await.unwrap(),
            });
        }
        (forced_status.unwrap_or(201), Bytes::new(), parts)
    } else {
        let body = to_bytes(request.into_body(), usize::MAX).await.unwrap();
        (forced_status.unwrap_or(200), body, Vec::new())
    };

    log.lock().unwrap().push(Recorded {
        method,
        uri: uri.clone(),
        headers,
        body: body.clone(),
        parts,
    });

    let reply = if is_multipart {
        Body::from(r#"{"result":{"action":"create_file"}}"#)
    } else {
        Body::from(body)
    };

    Response::builder()
        .status(StatusCode::from_u16(status).unwrap())
        .header("x-upstream", "mock")
        .header("x-upstream-uri", uri)
        .body(reply)
        .unwrap()
}

/// A proxy running on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(config: ProxyConfig, loader: RuleLoader) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::with_loader(config, loader);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    RunningProxy {
        addr,
        shutdown,
        config_tx,
    }
}

pub fn proxy_config(upstream: &str, staging: &Path, rules: &[(&str, bool)]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.url = upstream.to_string();
    config.upload.staging_dir = Some(staging.to_path_buf());
    config.rules = rules
        .iter()
        .map(|(name, enabled)| RuleConfig {
            name: name.to_string(),
            enabled: *enabled,
            rule: format!("builtin:{name}"),
        })
        .collect();
    config
}

/// Appends a fixed string to the staged file.
pub struct Append(pub &'static str);

#[async_trait]
impl Rule for Append {
    async fn process(&self, file: &Path) -> Result<(), RuleError> {
        let mut content = tokio::fs::read_to_string(file).await?;
        content.push_str(self.0);
        tokio::fs::write(file, content).await?;
        Ok(())
    }
}

/// Always fails.
pub struct Broken;

#[async_trait]
impl Rule for Broken {
    async fn process(&self, _file: &Path) -> Result<(), RuleError> {
        Err(RuleError::Other("broken rule".into()))
    }
}

/// Loader with the rules used across tests: `a`, `b`, `broken`, `marker`.
pub fn test_loader() -> RuleLoader {
    RuleLoader::new()
        .with_rule("a", Arc::new(Append("; A\n")))
        .with_rule("b", Arc::new(Append("; B\n")))
        .with_rule("broken", Arc::new(Broken))
        .with_rule("marker", Arc::new(PrependLine::new("; marker\n")))
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Number of entries left in the staging directory.
pub fn staged_entries(staging: &Path) -> usize {
    std::fs::read_dir(staging).unwrap().count()
}

/// An address nothing listens on.
pub async fn dead_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
