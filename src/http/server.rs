//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing, body limits)
//! - Hold the current configuration snapshot and swap it on reload
//! - Dispatch each request to the upload interceptor or the pass-through forwarder

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::request_id;
use crate::http::upstream::UpstreamClient;
use crate::http::{forward, upload};
use crate::observability::metrics;
use crate::pipeline::Pipeline;
use crate::routing::{Dispatch, Router as ProxyRouter};
use crate::rules::RuleLoader;

/// A configuration together with the router compiled from it.
#[derive(Debug)]
pub struct Snapshot {
    pub config: ProxyConfig,
    pub router: ProxyRouter,
}

impl Snapshot {
    pub fn new(config: ProxyConfig) -> Self {
        let router = ProxyRouter::from_config(&config.upload);
        Self { config, router }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<ArcSwap<Snapshot>>,
    pub upstream: UpstreamClient,
    pub pipeline: Pipeline,
}

/// HTTP server for the preprocessing proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the shipped rules.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_loader(config, RuleLoader::new())
    }

    /// Create a new HTTP server resolving rules through `loader`.
    pub fn with_loader(config: ProxyConfig, loader: RuleLoader) -> Self {
        let state = AppState {
            snapshot: Arc::new(ArcSwap::from_pointee(Snapshot::new(config))),
            upstream: UpstreamClient::new(),
            pipeline: Pipeline::new(loader),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            // Intercepted uploads enforce `upload.max_upload_bytes` themselves.
            .layer(DefaultBodyLimit::disable())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> Arc<Snapshot> {
        self.state.snapshot.load_full()
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` replace the current
    /// snapshot; in-flight requests keep the snapshot they started with.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let snapshot = self.state.snapshot.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                let current = snapshot.load();
                if current.config.listener.bind_address != config.listener.bind_address {
                    tracing::warn!(
                        bind_address = %config.listener.bind_address,
                        "Listener changes require a restart; ignoring new bind address"
                    );
                }
                tracing::info!(
                    upstream = %config.upstream.url,
                    rules = config.rule_chain().len(),
                    "Configuration reloaded"
                );
                snapshot.store(Arc::new(Snapshot::new(config)));
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Classifies the request and hands it to the interceptor or the forwarder.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let snapshot = state.snapshot.load_full();
    let request_id = request_id(request.headers());
    let dispatch = snapshot.router.classify(&request);

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        dispatch = dispatch.label(),
        "Proxying request"
    );

    let response = match dispatch {
        Dispatch::Upload => match upload::intercept(&state, &snapshot, request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        },
        Dispatch::PassThrough => {
            match forward::forward(state.upstream.passthrough(), &snapshot.config.upstream.url, request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Upstream error");
                    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
                }
            }
        }
    };

    metrics::record_request(dispatch.label(), response.status().as_u16(), start_time);
    response
}
