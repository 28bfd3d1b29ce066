//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Extension;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use bridge_engine::config::{BridgeConfig, StorageConfig, StorageDescriptor};
use bridge_engine::security::{Principal, RateLimit};
use bridge_engine::{HealthReport, ReportSink, RouteContext, RouteDefinition, RouteProvider};

pub const API_KEY: &str = "test-key";
pub const CACHE_PASSWORD: &str = "cache-secret";

/// Start a TCP backend that accepts connections and holds them open.
pub async fn start_mock_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// Config pointing at local backends with an ephemeral HTTP port.
pub fn test_config(storage: SocketAddr, cache: SocketAddr) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.server.port = 0;
    config.server.drain_timeout_secs = 1;
    config.storage = StorageConfig::Single(StorageDescriptor {
        host: storage.ip().to_string(),
        port: storage.port(),
        name: "bridge-test".to_string(),
        ..StorageDescriptor::default()
    });
    config.redis.host = cache.ip().to_string();
    config.redis.port = cache.port();
    config.redis.password = Some(CACHE_PASSWORD.to_string());
    config.auth.api_keys = vec![API_KEY.to_string()];
    config.health.connect_timeout_secs = 1;
    config
}

/// Report sink that keeps every emitted report.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<HealthReport>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<HealthReport> {
        self.reports.lock().unwrap().last().cloned()
    }
}

impl ReportSink for RecordingSink {
    fn emit(&self, report: &HealthReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

/// A small route group covering public, authenticated and blocking routes.
#[derive(Clone, Default)]
pub struct SampleRoutes {
    pub release: Arc<Notify>,
}

impl RouteProvider for SampleRoutes {
    fn name(&self) -> &str {
        "keys"
    }

    fn definitions(&self, context: &RouteContext) -> Vec<RouteDefinition> {
        let release = Arc::clone(&self.release);
        let database = Arc::clone(&context.storage);

        vec![
            RouteDefinition::get("/contacts", || async { "[]" }).summary("List contacts"),
            RouteDefinition::get("/keys", |Extension(principal): Extension<Principal>| async move {
                principal.id
            })
            .authenticated()
            .rate_limit(RateLimit::new(1, Duration::from_secs(3600))),
            RouteDefinition::get("/wait", move || {
                let release = Arc::clone(&release);
                async move {
                    release.notified().await;
                    "released"
                }
            }),
            RouteDefinition::get("/database", move || {
                let database = Arc::clone(&database);
                async move { database.ready_state().code().to_string() }
            }),
        ]
    }
}
