//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, content type)
//!     → router.rs (classify)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: Dispatch::Upload or Dispatch::PassThrough
//!
//! Compilation (per config snapshot):
//!     UploadConfig
//!     → POST ∧ path ∈ upload paths ∧ multipart/form-data
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Pure and total: every request is classified, nothing is rejected here
//! - Deterministic: same input always yields the same dispatch

pub mod matcher;
pub mod router;

pub use router::{Dispatch, Router};
