//! Health subsystem.
//!
//! # Data Flow
//! ```text
//! Response tracking (registry.rs):
//!     Request accepted → track(connection, response)
//!     Periodic sweep  → drop entries both destroyed and finished
//!
//! Health reporting (reporter.rs):
//!     Periodic timer
//!     → Query server connections + storage readiness
//!     → Sample process (process.rs)
//!     → Emit one HealthReport (report.rs)
//! ```
//!
//! # Design Decisions
//! - The registry holds weak handles only; it never extends a connection's life
//! - Reports are emitted through a sink trait so tests can count them
//! - Every timer is an owned task stopped by the shutdown broadcast

pub mod process;
pub mod registry;
pub mod report;
pub mod reporter;

pub use registry::{spawn_sweeper, ResponseId, ResponseRegistry, ResponseStatus};
pub use report::HealthReport;
pub use reporter::{DatabaseProbe, HealthReporter, LogSink, ProbeError, ReportSink, ServerProbe};
