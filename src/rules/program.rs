//! Rules implemented as external executables.
//!
//! A program rule is invoked as `<program> <staged-file>` and is expected to
//! rewrite the file in place. Exit status zero means success. Because the
//! program is looked up on every run, editing it takes effect on the next
//! upload without restarting the proxy.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::rules::contract::{Rule, RuleError};

/// Runs an external program against the staged file.
#[derive(Debug, Clone)]
pub struct ProgramRule {
    program: PathBuf,
}

impl ProgramRule {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Rule for ProgramRule {
    async fn process(&self, file: &Path) -> Result<(), RuleError> {
        // Dropping the future (client went away) kills the child.
        let output = Command::new(&self.program)
            .arg(file)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RuleError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!(program = ?self.program, "{}", line);
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(RuleError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
