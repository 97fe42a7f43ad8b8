//! Upload-preprocessing reverse proxy for a 3D-printer control API.
//!
//! Every request is relayed to the upstream printer API untouched, except
//! multipart uploads to the configured upload paths: those are staged on disk,
//! rewritten by an ordered chain of rules, and re-submitted upstream.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod rules;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use rules::{Rule, RuleError, RuleLoader};
