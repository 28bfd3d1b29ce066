//! Backend links.
//!
//! A link is a long-lived TCP session to a backend (storage, rate-limit
//! cache). It does not speak the backend's protocol; it tracks whether the
//! backend is reachable and exposes that as a readiness code.
//!
//! # State Transitions
//! ```text
//! Connecting → Connected     first reachable target accepted the session
//! Connecting → Disconnected  every target refused or timed out
//! Connected  → Disconnected  peer closed the session
//! Connected  → Disconnecting → Disconnected  on shutdown
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

/// Readiness code of a backend link.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadyState {
    Disconnected = 0,
    Connected = 1,
    Connecting = 2,
    Disconnecting = 3,
}

impl ReadyState {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<u8> for ReadyState {
    fn from(val: u8) -> Self {
        match val {
            1 => ReadyState::Connected,
            2 => ReadyState::Connecting,
            3 => ReadyState::Disconnecting,
            _ => ReadyState::Disconnected,
        }
    }
}

/// One address a link may connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub host: String,
    pub port: u16,
}

impl LinkTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Shared readiness of a link.
#[derive(Debug)]
pub struct LinkState {
    name: &'static str,
    state: AtomicU8,
}

impl LinkState {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: AtomicU8::new(ReadyState::Disconnected as u8),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ReadyState) {
        let previous = ReadyState::from(self.state.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            tracing::debug!(link = self.name, from = ?previous, to = ?state, "Link state changed");
        }
    }
}

/// Spawn the background task that owns the link session.
pub fn spawn_link(
    state: Arc<LinkState>,
    targets: Vec<LinkTarget>,
    connect_timeout: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    state.set(ReadyState::Connecting);

    tokio::spawn(async move {
        let stream = tokio::select! {
            stream = connect_first(&state, &targets, connect_timeout) => stream,
            _ = shutdown.recv() => None,
        };

        let Some(mut stream) = stream else {
            state.set(ReadyState::Disconnected);
            return;
        };

        let mut buf = [0u8; 512];
        loop {
            tokio::select! {
                read = stream.read(&mut buf) => match read {
                    Ok(0) => {
                        tracing::warn!(link = state.name(), "Connection closed by peer");
                        break;
                    }
                    // Backend chatter is not interpreted.
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(link = state.name(), error = %e, "Connection lost");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    state.set(ReadyState::Disconnecting);
                    break;
                }
            }
        }

        drop(stream);
        state.set(ReadyState::Disconnected);
    })
}

async fn connect_first(
    state: &LinkState,
    targets: &[LinkTarget],
    connect_timeout: Duration,
) -> Option<TcpStream> {
    for target in targets {
        let address = target.to_string();
        match time::timeout(connect_timeout, TcpStream::connect(address.as_str())).await {
            Ok(Ok(stream)) => {
                tracing::info!(link = state.name(), target = %target, "Connection opened");
                state.set(ReadyState::Connected);
                return Some(stream);
            }
            Ok(Err(e)) => {
                tracing::error!(link = state.name(), target = %target, error = %e, "Failed to open connection");
            }
            Err(_) => {
                tracing::error!(link = state.name(), target = %target, "Failed to open connection: timeout");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn wait_for(state: &LinkState, expected: ReadyState) {
        time::timeout(Duration::from_secs(5), async {
            while state.ready_state() != expected {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn ready_state_codes() {
        assert_eq!(ReadyState::Disconnected.code(), 0);
        assert_eq!(ReadyState::Connected.code(), 1);
        assert_eq!(ReadyState::Connecting.code(), 2);
        assert_eq!(ReadyState::Disconnecting.code(), 3);
        assert_eq!(ReadyState::from(9), ReadyState::Disconnected);
    }

    #[tokio::test]
    async fn connects_and_disconnects_on_shutdown() {
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = backend.local_addr().unwrap().port();
        let (tx, _) = broadcast::channel(1);

        let state = Arc::new(LinkState::new("test"));
        let task = spawn_link(
            Arc::clone(&state),
            vec![LinkTarget::new("127.0.0.1", port)],
            Duration::from_secs(1),
            tx.subscribe(),
        );

        let (_peer, _) = backend.accept().await.unwrap();
        wait_for(&state, ReadyState::Connected).await;

        tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(state.ready_state(), ReadyState::Disconnected);
    }

    #[tokio::test]
    async fn falls_through_to_next_target() {
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);

        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = backend.local_addr().unwrap().port();
        let (tx, _) = broadcast::channel(1);

        let state = Arc::new(LinkState::new("test"));
        let _task = spawn_link(
            Arc::clone(&state),
            vec![LinkTarget::new("127.0.0.1", dead_port), LinkTarget::new("127.0.0.1", port)],
            Duration::from_secs(1),
            tx.subscribe(),
        );

        let (peer, _) = backend.accept().await.unwrap();
        wait_for(&state, ReadyState::Connected).await;

        drop(peer);
        wait_for(&state, ReadyState::Disconnected).await;
    }

    #[tokio::test]
    async fn unreachable_targets_leave_link_disconnected() {
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);
        let (tx, _) = broadcast::channel(1);

        let state = Arc::new(LinkState::new("test"));
        let task = spawn_link(
            Arc::clone(&state),
            vec![LinkTarget::new("127.0.0.1", dead_port)],
            Duration::from_secs(1),
            tx.subscribe(),
        );
        task.await.unwrap();
        assert_eq!(state.ready_state(), ReadyState::Disconnected);
    }
}
