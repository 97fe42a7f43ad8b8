//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → routing (classify)
//!     ├─ upload.rs (stage → rule pipeline → multipart re-submission)
//!     └─ forward.rs (streamed pass-through)
//!     → upstream.rs (pooled clients)
//!     → headers.rs (hop-by-hop stripping both ways)
//!     → Send to client
//! ```

pub mod forward;
pub mod headers;
pub mod request;
pub mod server;
pub mod upload;
pub mod upstream;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, Snapshot};
pub use upload::UploadError;
