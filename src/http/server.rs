//! HTTP server setup.
//!
//! # Responsibilities
//! - Bind the tracked listener
//! - Serve the composed router with connection info attached
//! - Stop accepting on the shutdown broadcast and let connections drain
//! - Answer health queries about listening state and connection count

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::serve::Listener;
use axum::Router;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::health::{ProbeError, ServerProbe};
use crate::net::listener::ListenerError;
use crate::net::{ClientConn, ConnectionTracker, TrackedListener};

/// Listening flag plus the reason the serve loop ended, if it failed.
#[derive(Debug)]
struct ServeState {
    listening: AtomicBool,
    failure: OnceLock<String>,
}

impl ServeState {
    fn new() -> Self {
        Self {
            listening: AtomicBool::new(true),
            failure: OnceLock::new(),
        }
    }

    fn stopped(&self, result: io::Result<()>) {
        self.listening.store(false, Ordering::Release);
        match result {
            Ok(()) => tracing::info!("HTTP server stopped"),
            Err(e) => {
                tracing::error!(error = %e, "HTTP server failed");
                let _ = self.failure.set(format!("HTTP server failed: {e}"));
            }
        }
    }
}

/// Handle to a running HTTP server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    tracker: ConnectionTracker,
    state: Arc<ServeState>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Wait until every connection has closed or `timeout` elapses.
    pub async fn drain(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.tracker.wait_for_drain())
            .await
            .is_ok()
    }
}

#[async_trait]
impl ServerProbe for ServerHandle {
    fn is_listening(&self) -> bool {
        self.state.listening.load(Ordering::Acquire)
    }

    async fn connections(&self) -> Result<u64, ProbeError> {
        if let Some(failure) = self.state.failure.get() {
            return Err(ProbeError::Failed(failure.clone()));
        }
        if !self.is_listening() {
            return Err(ProbeError::NotListening);
        }
        Ok(self.tracker.active_count())
    }
}

/// Bind and start serving `app` in the background.
pub async fn serve(
    app: Router,
    config: &ServerConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(ServerHandle, JoinHandle<()>), ListenerError> {
    let tracker = ConnectionTracker::new();
    let listener = TrackedListener::bind(config, tracker.clone()).await?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    let state = Arc::new(ServeState::new());
    let handle = ServerHandle {
        local_addr,
        tracker,
        state: Arc::clone(&state),
    };

    tracing::info!(address = %local_addr, max_connections = config.max_connections, "HTTP server starting");

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app.into_make_service_with_connect_info::<ClientConn>())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server no longer accepting connections");
            })
            .await;

        state.stopped(result);
    });

    Ok((handle, task))
}
