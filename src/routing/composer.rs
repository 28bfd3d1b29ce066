//! Route composition.
//!
//! # Responsibilities
//! - Wrap each route as rate limit → authentication → extra middleware → handler
//! - Bind `GET /` to the cached API specification
//! - Register the JSON error handler after every route, fallback included
//! - Add app-wide layers (tracking, request id, tracing, CORS, body limit)
//!
//! # Design Decisions
//! - Composition happens once at startup; the resulting Router is immutable
//! - A duplicate method + path is skipped with a warning instead of panicking

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::cache::CacheClient;
use crate::health::ResponseRegistry;
use crate::http::{error_handler, not_found, track_responses};
use crate::security::{auth_middleware, rate_limit_middleware, Authenticator, RateLimit, RateLimitState};

use super::definition::RouteDefinition;
use super::spec::{serve_specification, ApiSpecification};

/// Builds the application router from route groups.
pub struct RouteComposer {
    cache: Arc<CacheClient>,
    authenticator: Arc<dyn Authenticator>,
    default_limit: RateLimit,
    max_body_size: usize,
}

impl RouteComposer {
    pub fn new(
        cache: Arc<CacheClient>,
        authenticator: Arc<dyn Authenticator>,
        default_limit: RateLimit,
        max_body_size: usize,
    ) -> Self {
        Self {
            cache,
            authenticator,
            default_limit,
            max_body_size,
        }
    }

    pub fn compose(
        &self,
        groups: Vec<(String, Vec<RouteDefinition>)>,
        specification: Arc<ApiSpecification>,
        registry: Arc<ResponseRegistry>,
    ) -> Router {
        let mut router = Router::new().route("/", get(serve_specification).with_state(specification));
        let mut seen: HashSet<(Method, String)> = HashSet::new();
        seen.insert((Method::GET, "/".to_string()));

        for (group, routes) in groups {
            for route in routes {
                if !seen.insert((route.method.clone(), route.path.clone())) {
                    tracing::warn!(group = %group, route = %route.label(), "Duplicate route skipped");
                    continue;
                }
                tracing::debug!(
                    group = %group,
                    route = %route.label(),
                    authenticated = route.authenticated,
                    "Registering route"
                );
                let path = route.path.clone();
                router = router.route(&path, self.wrap(route));
            }
        }

        router
            .fallback(not_found)
            .layer(middleware::from_fn(error_handler))
            .layer(RequestBodyLimitLayer::new(self.max_body_size))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(middleware::from_fn_with_state(registry, track_responses))
    }

    /// Route layers run outermost-last: the rate limiter sees the request first.
    fn wrap(&self, route: RouteDefinition) -> axum::routing::MethodRouter {
        let limiter = RateLimitState {
            cache: Arc::clone(&self.cache),
            limit: route.rate_limit.unwrap_or(self.default_limit),
            route: Arc::from(route.label()),
        };

        let mut handler = route.handler;
        if route.authenticated {
            handler = handler.route_layer(middleware::from_fn_with_state(
                Arc::clone(&self.authenticator),
                auth_middleware,
            ));
        }
        handler.route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
    }
}
