//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the preprocessing proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream printer API.
    pub upstream: UpstreamConfig,

    /// Upload interception settings.
    pub upload: UploadConfig,

    /// Ordered rule chain. Order is significant.
    pub rules: Vec<RuleConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Enabled rules in configuration order.
    pub fn rule_chain(&self) -> Vec<RuleConfig> {
        self.rules.iter().filter(|r| r.enabled).cloned().collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7126").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7126".to_string(),
        }
    }
}

/// Upstream server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the printer API (e.g., "http://127.0.0.1:7125").
    pub url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7125".to_string(),
        }
    }
}

/// Upload interception configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Paths whose multipart POSTs are intercepted (exact match).
    pub paths: Vec<String>,

    /// Directory for staged uploads. Falls back to the OS temp dir.
    pub staging_dir: Option<PathBuf>,

    /// Maximum accepted size of an intercepted upload body, in bytes.
    pub max_upload_bytes: usize,
}

impl UploadConfig {
    /// Resolved staging directory.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            paths: vec![
                "/server/files/upload".to_string(),
                "/api/files/local".to_string(),
            ],
            staging_dir: None,
            max_upload_bytes: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// One entry of the rule chain.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RuleConfig {
    /// Rule identifier for logging/metrics.
    pub name: String,

    /// Disabled rules are skipped without affecting the order of the rest.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// `builtin:<name>` or a path to an executable rule program.
    pub rule: String,
}

fn default_enabled() -> bool {
    true
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Diagnostic verbosity (debug-level logs for this crate).
    pub verbose: bool,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
