//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::TrackedListener)
//!     → server.rs (axum serve, connection info, graceful shutdown)
//!     → response.rs (register response, wrap body)
//!     → [app-wide layers, per-route chain] (routing::composer)
//!     → error.rs (render ApiError as JSON)
//!     → Send to client
//! ```

pub mod error;
pub mod response;
pub mod server;

pub use error::{error_handler, not_found, ApiError};
pub use response::{track_responses, TrackedBody};
pub use server::{serve, ServerHandle};
