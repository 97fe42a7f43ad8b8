//! Compiled-in rules, addressed as `builtin:<name>` in the rule chain.

pub mod header;
pub mod orca;

use std::path::Path;
use std::sync::Arc;

use crate::rules::contract::Rule;

pub use header::PrependLine;
pub use orca::OrcaMultiExtruder;

/// Names of the rules shipped with the proxy.
pub const BUILTIN_NAMES: &[&str] = &["processed_header", "orca_multi_extruder"];

/// Instantiate a shipped rule by name.
pub fn builtin(name: &str) -> Option<Arc<dyn Rule>> {
    match name {
        "processed_header" => Some(Arc::new(PrependLine::default())),
        "orca_multi_extruder" => Some(Arc::new(OrcaMultiExtruder)),
        _ => None,
    }
}

/// True for `.gcode` and `.g` files (case-insensitive).
pub fn is_gcode(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gcode") || ext.eq_ignore_ascii_case("g"))
        .unwrap_or(false)
}
