//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Storage → Mailer → Cache → Compose routes → Listen
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain connections → Cancel tasks
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → caller runs Engine::shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then backends, listeners last
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has a deadline: tasks are aborted after the drain timeout

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{Bootstrap, BootstrapError, Subsystems};
