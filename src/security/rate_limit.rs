//! Per-route rate limiting middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::cache::CacheClient;
use crate::config::RateLimitConfig;
use crate::http::error::ApiError;
use crate::net::ClientConn;
use crate::observability::metrics;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub total: u32,
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(total: u32, window: Duration) -> Self {
        Self { total, window }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.total, Duration::from_secs(config.window_secs))
    }
}

/// State for one route's limiter.
#[derive(Clone)]
pub struct RateLimitState {
    pub cache: Arc<CacheClient>,
    pub limit: RateLimit,
    /// Route label, e.g. `GET /keys`.
    pub route: Arc<str>,
}

/// Middleware function for per-route, per-client rate limiting.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<ClientConn>>()
        .map(|ConnectInfo(conn)| conn.remote_addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let key = format!("{}|{}", state.route, client);
    let decision = state.cache.hit(&key, &state.limit);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, route = %state.route, "Rate limit exceeded");
        metrics::record_rate_limited(&state.route);
        ApiError::TooManyRequests.into_response()
    };

    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}
