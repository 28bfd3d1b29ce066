//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (per route):
//!     → rate_limit.rs (per-route, per-client token bucket)
//!     → auth.rs (credential check, attach Principal)
//!     → route handler
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs before authentication so unauthenticated floods are cheap
//! - Fail closed: reject on any security check failure
//! - Rejections are ApiErrors, rendered by the shared error handler

pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, ApiKeyAuthenticator, Authenticator, Principal};
pub use rate_limit::{rate_limit_middleware, RateLimit, RateLimitState};
