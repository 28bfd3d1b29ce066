//! Route declarations.
//!
//! Route groups implement [`RouteProvider`] and hand the composer a list of
//! [`RouteDefinition`]s. A definition is immutable once composed.

use std::sync::Arc;

use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{on, MethodFilter, MethodRouter};

use crate::cache::CacheClient;
use crate::config::BridgeConfig;
use crate::mail::Mailer;
use crate::security::RateLimit;
use crate::storage::StorageConnection;

/// Live collaborators handed to route providers.
#[derive(Debug, Clone)]
pub struct RouteContext {
    pub config: Arc<BridgeConfig>,
    pub storage: Arc<StorageConnection>,
    pub mailer: Arc<Mailer>,
    pub cache: Arc<CacheClient>,
}

/// A named group of routes.
pub trait RouteProvider: Send + Sync {
    /// Tag used in the API specification document.
    fn name(&self) -> &str;

    fn definitions(&self, context: &RouteContext) -> Vec<RouteDefinition>;
}

/// One method + path bound to a handler.
pub struct RouteDefinition {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) rate_limit: Option<RateLimit>,
    pub(crate) authenticated: bool,
    pub(crate) summary: Option<String>,
    pub(crate) handler: MethodRouter,
}

impl RouteDefinition {
    fn with_filter<H, T>(method: Method, filter: MethodFilter, path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self {
            method,
            path: path.into(),
            rate_limit: None,
            authenticated: false,
            summary: None,
            handler: on(filter, handler),
        }
    }

    pub fn get<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::with_filter(Method::GET, MethodFilter::GET, path, handler)
    }

    pub fn post<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::with_filter(Method::POST, MethodFilter::POST, path, handler)
    }

    pub fn put<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::with_filter(Method::PUT, MethodFilter::PUT, path, handler)
    }

    pub fn patch<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::with_filter(Method::PATCH, MethodFilter::PATCH, path, handler)
    }

    pub fn delete<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::with_filter(Method::DELETE, MethodFilter::DELETE, path, handler)
    }

    /// Override the global rate limit for this route.
    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Require authentication before the handler runs.
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Wrap the handler in extra middleware. Runs after rate limiting and
    /// authentication.
    pub fn with_middleware<F>(mut self, apply: F) -> Self
    where
        F: FnOnce(MethodRouter) -> MethodRouter,
    {
        self.handler = apply(self.handler);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn requires_auth(&self) -> bool {
        self.authenticated
    }

    /// Label used for rate-limit keys and metrics, e.g. `GET /keys`.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

impl std::fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("rate_limit", &self.rate_limit)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}
