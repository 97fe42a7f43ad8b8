//! OrcaSlicer multi-extruder output rewritten for a single-extruder printer.
//!
//! OrcaSlicer emits filament-change (`M600`) and tool-select (`T<n>`)
//! commands for multi-material profiles. When such a file is printed on a
//! single toolhead the commands stall or error, so this rule:
//! - comments out bare `M600` lines before the print starts (first
//!   `;TYPE:Skirt` or `BEFORE_LAYER_CHANGE` marker)
//! - comments out bare `T<n>` lines anywhere
//! - strips `T<n>` words from `M104`/`M109`, and comments out `M104` preheat
//!   lines entirely

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::rules::builtin::is_gcode;
use crate::rules::contract::{Rule, RuleError};

const TAG: &str = "OrcaSlicer Multi-Extruder Cheating";

static BARE_M600: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*M600\s*$").unwrap());
static BARE_TOOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*T\d+\s*$").unwrap());
static TOOL_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bT\d+\s*").unwrap());

/// See module docs.
#[derive(Debug, Clone, Default)]
pub struct OrcaMultiExtruder;

#[async_trait]
impl Rule for OrcaMultiExtruder {
    async fn process(&self, file: &Path) -> Result<(), RuleError> {
        if !is_gcode(file) {
            tracing::debug!(file = ?file, "Skipping non-gcode file");
            return Ok(());
        }

        let bytes = tokio::fs::read(file).await?;
        let text = String::from_utf8(bytes).map_err(|_| RuleError::Encoding)?;
        tokio::fs::write(file, rewrite(&text)).await?;
        Ok(())
    }
}

fn commented(line: &str) -> String {
    format!(";{} ; commented out by {TAG}\n", line.trim_end())
}

fn strip_tool(line: &str) -> String {
    let stripped = TOOL_WORD.replace_all(line, "");
    if stripped == line {
        line.to_string()
    } else {
        format!("{} ; T[n] removed by {TAG}\n", stripped.trim_end())
    }
}

/// Apply the rewrite to a whole file.
pub fn rewrite(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 256);
    out.push_str("; File modified by Moonraker Preprocessing Proxy\n");
    out.push_str(&format!("; Rule: {TAG}\n"));
    out.push('\n');

    let mut print_started = false;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();

        if !print_started && (line.contains(";TYPE:Skirt") || line.contains("BEFORE_LAYER_CHANGE")) {
            print_started = true;
            out.push_str(line);
            continue;
        }

        if !print_started && BARE_M600.is_match(trimmed) {
            out.push_str(&commented(line));
        } else if trimmed.starts_with("M104") {
            if line.to_lowercase().contains("preheat") {
                out.push_str(&commented(line));
            } else {
                out.push_str(&strip_tool(line));
            }
        } else if trimmed.starts_with("M109") {
            out.push_str(&strip_tool(line));
        } else if BARE_TOOL.is_match(trimmed) {
            out.push_str(&commented(line));
        } else {
            out.push_str(line);
        }
    }
    out
}
