//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Composition (at startup):
//!     RouteProvider[]
//!     → definition.rs (RouteDefinition per method + path)
//!     → spec.rs (API specification document, rendered once)
//!     → composer.rs (per-route chain + app-wide layers)
//!     → Freeze as immutable Router
//!
//! Per request:
//!     rate limit → authentication → extra middleware → handler
//!     → error handler (JSON)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Error handling registered after every route, fallback included
//! - Deterministic: the same providers always produce the same Router

pub mod composer;
pub mod definition;
pub mod spec;

pub use composer::RouteComposer;
pub use definition::{RouteContext, RouteDefinition, RouteProvider};
pub use spec::ApiSpecification;
