//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (lifecycle tracking, destroyed flag)
//!     → Hand off to HTTP layer
//!
//! Outgoing backend links (storage, cache):
//!     → link.rs (connect, hold session, report readiness code)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for health reports and graceful shutdown
//! - Backend links never fail startup; they only report readiness

pub mod connection;
pub mod link;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionStatus, ConnectionTracker};
pub use link::{LinkState, LinkTarget, ReadyState};
pub use listener::{ClientConn, TrackedListener, TrackedStream};
