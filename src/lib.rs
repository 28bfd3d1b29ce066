//! Storage bridge runtime supervisor.
//!
//! ```text
//!     BridgeConfig
//!         │
//!         ▼
//!     Engine::start
//!         storage → mailer → cache → routes → listen
//!         │
//!         ├── HealthReporter (every report_interval_secs)
//!         └── ResponseRegistry sweep (every sweep_interval_secs)
//!
//!     Request path:
//!         TrackedListener → track_responses → request id / trace / cors / limit
//!             → rate limit → auth → handler → error_handler
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod mail;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;
pub mod storage;

pub use config::BridgeConfig;
pub use engine::Engine;
pub use health::{HealthReport, ReportSink};
pub use lifecycle::BootstrapError;
pub use routing::{RouteContext, RouteDefinition, RouteProvider};
