//! Marks G-code uploads as having passed through the proxy.

use std::path::Path;

use async_trait::async_trait;

use crate::rules::builtin::is_gcode;
use crate::rules::contract::{Rule, RuleError};

/// Comment line prepended to processed G-code.
pub const PROCESSED_HEADER: &str = "; Processed by Moonraker Preprocessing Proxy\n";

/// Prepends a fixed comment line to `.gcode`/`.g` files.
#[derive(Debug, Clone)]
pub struct PrependLine {
    line: String,
}

impl PrependLine {
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }
}

impl Default for PrependLine {
    fn default() -> Self {
        Self::new(PROCESSED_HEADER)
    }
}

#[async_trait]
impl Rule for PrependLine {
    async fn process(&self, file: &Path) -> Result<(), RuleError> {
        if !is_gcode(file) {
            return Ok(());
        }

        let content = tokio::fs::read(file).await?;
        let mut out = Vec::with_capacity(self.line.len() + content.len());
        out.extend_from_slice(self.line.as_bytes());
        out.extend_from_slice(&content);
        tokio::fs::write(file, out).await?;
        Ok(())
    }
}
