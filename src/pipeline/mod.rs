//! Upload transformation pipeline.
//!
//! # Data Flow
//! ```text
//! multipart file field
//!     → staging.rs (unique directory, original filename as leaf)
//!     → executor.rs (rule chain, strictly sequential, failures contained)
//!     → staged bytes re-read for the upstream submission
//!     → staging.rs removal (explicit, or on drop when the request is cancelled)
//! ```

pub mod executor;
pub mod staging;

pub use executor::{Pipeline, PipelineReport, RuleOutcome, RuleReport};
pub use staging::StagedFile;
