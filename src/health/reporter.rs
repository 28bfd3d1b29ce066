//! Periodic health reporting.
//!
//! # Responsibilities
//! - Query the HTTP server and storage link once per tick
//! - Combine query results with process metrics and the registry count
//! - Emit exactly one report per tick through a [`ReportSink`]
//!
//! # Design Decisions
//! - Query failures land in the report; they never stop the loop
//! - Ticks never overlap: the next delay starts after the emission

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use super::process::{self, CpuUsage};
use super::registry::ResponseRegistry;
use super::report::HealthReport;
use crate::observability::metrics;

/// Failure to query the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("server is not listening")]
    NotListening,

    #[error("{0}")]
    Failed(String),
}

/// HTTP server view needed by the reporter.
#[async_trait]
pub trait ServerProbe: Send + Sync {
    fn is_listening(&self) -> bool;

    async fn connections(&self) -> Result<u64, ProbeError>;
}

/// Storage readiness view needed by the reporter.
pub trait DatabaseProbe: Send + Sync {
    /// 0 disconnected, 1 connected, 2 connecting, 3 disconnecting.
    fn database_state(&self) -> u8;
}

/// Destination for finished reports.
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &HealthReport);
}

/// Writes each report as one structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&self, report: &HealthReport) {
        tracing::info!(bridge_health_report = %report.to_json(), "Health report");
    }
}

pub struct HealthReporter {
    server: Arc<dyn ServerProbe>,
    database: Arc<dyn DatabaseProbe>,
    registry: Arc<ResponseRegistry>,
    sink: Arc<dyn ReportSink>,
    previous_cpu: Option<CpuUsage>,
}

impl HealthReporter {
    pub fn new(
        server: Arc<dyn ServerProbe>,
        database: Arc<dyn DatabaseProbe>,
        registry: Arc<ResponseRegistry>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            server,
            database,
            registry,
            sink,
            previous_cpu: None,
        }
    }

    /// Build and emit one report.
    pub async fn tick(&mut self) -> HealthReport {
        let (connections, error) = match self.server.connections().await {
            Ok(count) => (Some(count), None),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to query server connections");
                (None, Some(e.to_string()))
            }
        };
        let database_state = self.database.database_state();
        let pending_responses = self.registry.count();

        let snapshot = process::sample();
        let cpu_diff = match &self.previous_cpu {
            Some(previous) => snapshot.cpu.since(previous),
            None => snapshot.cpu,
        };
        self.previous_cpu = Some(snapshot.cpu);

        let report = HealthReport {
            pid: snapshot.pid,
            cpu_usage: snapshot.cpu,
            cpu_diff,
            memory: snapshot.memory,
            heap_statistics: snapshot.heap,
            heap_space_statistics: snapshot.heap_spaces,
            uptime: snapshot.uptime,
            listening: self.server.is_listening(),
            connections,
            pending_responses,
            database_state,
            error,
        };

        self.sink.emit(&report);
        metrics::record_pending_responses(pending_responses);
        metrics::record_health(&report);
        report
    }

    /// Tick every `interval` until shutdown.
    pub async fn run(mut self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = interval.as_secs(), "Health reporter starting");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health reporter received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
