//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handling and the rule pipeline produce:
//!     → logging.rs (structured tracing events, request/rule spans)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! # Design Decisions
//! - Events are emitted at rule start/end/failure and upstream outcome
//! - Request ID flows from the inbound request into upstream calls
//! - Nothing here influences control flow

pub mod logging;
pub mod metrics;
