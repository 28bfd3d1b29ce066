//! Rate-limit cache client.
//!
//! # Responsibilities
//! - Hold the rate-limit backend connection parameters (inspectable after start)
//! - Keep a background link to the backend for readiness reporting
//! - Store per-key token buckets used by the rate limiter middleware
//!
//! # Design Decisions
//! - Counters live in process; the backend wire protocol is not spoken here
//! - Idle buckets are pruned opportunistically on the hit path, each against
//!   its own window

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::RedisConfig;
use crate::net::link::{spawn_link, LinkState, LinkTarget, ReadyState};
use crate::security::rate_limit::RateLimit;

/// How many hits between idle-bucket pruning passes.
const PRUNE_EVERY: u64 = 1024;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache host must not be empty")]
    EmptyHost,

    #[error("cache port must be greater than zero")]
    InvalidPort,
}

/// Connection parameters of the cache backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: u16,
}

/// Outcome of one rate-limit hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Window of the limit that last touched this bucket.
    window: Duration,
}

impl TokenBucket {
    fn new(capacity: f64, window: Duration) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            window,
        }
    }

    /// Untouched for two of its own windows; a fresh bucket would be full again.
    fn is_expired(&self) -> bool {
        self.last_update.elapsed() >= self.window * 2
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Client for the rate-limit backend.
#[derive(Debug)]
pub struct CacheClient {
    pub connection_options: ConnectionOptions,
    auth_pass: Option<String>,
    link: Arc<LinkState>,
    buckets: DashMap<String, TokenBucket>,
    hits: AtomicU64,
}

impl CacheClient {
    /// Validate parameters and start the backend link.
    pub fn connect(
        config: &RedisConfig,
        connect_timeout: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(Self, JoinHandle<()>), CacheError> {
        if config.host.trim().is_empty() {
            return Err(CacheError::EmptyHost);
        }
        if config.port == 0 {
            return Err(CacheError::InvalidPort);
        }

        let connection_options = ConnectionOptions {
            host: config.host.clone(),
            port: config.port,
        };
        tracing::info!(
            host = %connection_options.host,
            port = connection_options.port,
            auth = config.password.is_some(),
            "Connecting rate-limit cache"
        );

        let link = Arc::new(LinkState::new("cache"));
        let task = spawn_link(
            Arc::clone(&link),
            vec![LinkTarget::new(config.host.clone(), config.port)],
            connect_timeout,
            shutdown,
        );

        Ok((
            Self {
                connection_options,
                auth_pass: config.password.clone(),
                link,
                buckets: DashMap::new(),
                hits: AtomicU64::new(0),
            },
            task,
        ))
    }

    /// Password used to authenticate against the backend, if any.
    pub fn auth_pass(&self) -> Option<&str> {
        self.auth_pass.as_deref()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.link.ready_state()
    }

    /// Consume one token for `key` under `limit`.
    pub fn hit(&self, key: &str, limit: &RateLimit) -> RateDecision {
        if self.hits.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune_expired();
        }

        let capacity = f64::from(limit.total);
        let refill_rate = capacity / limit.window.as_secs_f64().max(f64::EPSILON);

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(capacity, limit.window));
        bucket.window = limit.window;
        let allowed = bucket.try_acquire(capacity, refill_rate);

        RateDecision {
            allowed,
            limit: limit.total,
            remaining: bucket.tokens.floor().max(0.0) as u32,
        }
    }

    /// Drop buckets left untouched for twice their own window.
    pub fn prune_expired(&self) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_expired());
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}
