//! TCP listener implementation with backpressure and connection tracking.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Wrap each stream so its lifetime is visible to the connection tracker
//! - Graceful handling of accept errors

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::connect_info::Connected;
use axum::serve::{IncomingStream, Listener};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ServerConfig;
use crate::net::connection::{ConnectionGuard, ConnectionStatus, ConnectionTracker};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to resolve the bind address.
    #[error("Failed to resolve {address}: {source}")]
    Resolve { address: String, source: io::Error },
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),
}

/// A bounded TCP listener that limits and tracks concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct TrackedListener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    tracker: ConnectionTracker,
}

impl TrackedListener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ServerConfig, tracker: ConnectionTracker) -> Result<Self, ListenerError> {
        let address = config.bind_address();
        let addr = match address.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(_) => tokio::net::lookup_host(&address)
                .await
                .map_err(|source| ListenerError::Resolve { address: address.clone(), source })?
                .next()
                .ok_or_else(|| ListenerError::Resolve {
                    address: address.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
                })?,
        };

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            tracker,
        })
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

impl Listener for TrackedListener {
    type Io = TrackedStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        // Acquire permit first (backpressure)
        let permit = self.connection_limit.clone().acquire_owned().await.ok();

        loop {
            match self.inner.accept().await {
                Ok((stream, addr)) => {
                    let guard = self.tracker.track();
                    tracing::debug!(
                        peer_addr = %addr,
                        connection_id = %guard.id(),
                        available_permits = self.connection_limit.available_permits(),
                        "Connection accepted"
                    );
                    let stream = TrackedStream {
                        inner: stream,
                        guard,
                        _permit: permit,
                    };
                    return (stream, addr);
                }
                Err(e) if is_connection_error(&e) => continue,
                Err(e) => {
                    // EMFILE and friends: back off instead of spinning.
                    tracing::error!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// An accepted stream that releases its tracking guard and connection slot
/// when dropped.
#[derive(Debug)]
pub struct TrackedStream {
    inner: TcpStream,
    guard: ConnectionGuard,
    _permit: Option<OwnedSemaphorePermit>,
}

impl TrackedStream {
    pub fn status(&self) -> &Arc<ConnectionStatus> {
        self.guard.status()
    }
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

/// Per-connection info made available to handlers via `ConnectInfo`.
#[derive(Debug, Clone)]
pub struct ClientConn {
    pub remote_addr: SocketAddr,
    pub status: Arc<ConnectionStatus>,
}

impl Connected<IncomingStream<'_, TrackedListener>> for ClientConn {
    fn connect_info(stream: IncomingStream<'_, TrackedListener>) -> Self {
        Self {
            remote_addr: *stream.remote_addr(),
            status: Arc::clone(stream.io().status()),
        }
    }
}
