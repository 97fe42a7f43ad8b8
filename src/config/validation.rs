//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and the upstream URL
//! - Detect duplicate or empty rule entries
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid upstream url '{0}': {1}")]
    UpstreamUrl(String, String),

    #[error("upload path '{0}' must start with '/'")]
    UploadPath(String),

    #[error("max_upload_bytes must be greater than zero")]
    UploadLimit,

    #[error("rule #{0} has an empty name")]
    EmptyRuleName(usize),

    #[error("rule '{0}' has an empty reference")]
    EmptyRuleReference(String),

    #[error("duplicate rule name '{0}'")]
    DuplicateRule(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match Url::parse(&config.upstream.url) {
        Ok(url) if url.scheme() == "http" => {}
        Ok(url) => errors.push(ValidationError::UpstreamUrl(
            config.upstream.url.clone(),
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::UpstreamUrl(config.upstream.url.clone(), e.to_string())),
    }

    for path in &config.upload.paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::UploadPath(path.clone()));
        }
    }

    if config.upload.max_upload_bytes == 0 {
        errors.push(ValidationError::UploadLimit);
    }

    let mut seen = HashSet::new();
    for (i, rule) in config.rules.iter().enumerate() {
        if rule.name.trim().is_empty() {
            errors.push(ValidationError::EmptyRuleName(i));
        } else if !seen.insert(rule.name.as_str()) {
            errors.push(ValidationError::DuplicateRule(rule.name.clone()));
        }
        if rule.rule.trim().is_empty() {
            errors.push(ValidationError::EmptyRuleReference(rule.name.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(config.observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
