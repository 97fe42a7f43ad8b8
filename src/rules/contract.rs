//! The contract every transformation rule satisfies.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// A transformation applied in place to a staged upload.
///
/// Implementations read the file at `file`, rewrite it, and report success or
/// failure. The pipeline guarantees the file exists and that no other rule
/// touches it concurrently.
#[async_trait]
pub trait Rule: Send + Sync {
    async fn process(&self, file: &Path) -> Result<(), RuleError>;
}

/// Errors raised while running a rule.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is not valid UTF-8 text")]
    Encoding,

    #[error("failed to spawn rule program {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("rule program exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("{0}")]
    Other(String),
}

/// Errors raised while resolving a rule reference.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("rule program {0:?} not found")]
    NotFound(PathBuf),

    #[error("cannot inspect rule program {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
