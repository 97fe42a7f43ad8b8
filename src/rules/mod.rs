//! Transformation rules subsystem.
//!
//! # Data Flow
//! ```text
//! RuleConfig.rule ("builtin:<name>" | "/path/to/program")
//!     → loader.rs (resolve on every use, never cached)
//!     → contract.rs Rule::process(staged file)
//!         → builtin/ (compiled-in rules)
//!         → program.rs (external executable, live-editable)
//! ```

pub mod builtin;
pub mod contract;
pub mod loader;
pub mod program;

pub use contract::{LoadError, Rule, RuleError};
pub use loader::{Resolved, RuleLoader, RuleSource};
pub use program::ProgramRule;
