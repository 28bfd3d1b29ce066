//! Storage connection.
//!
//! # Responsibilities
//! - Turn one or more storage descriptors into a composite connection target
//! - Keep a background link to the first reachable host
//! - Expose the readiness code consumed by the health reporter
//!
//! The query layer and schema live outside this crate; this module only
//! owns the connection lifecycle.

pub mod uri;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::StorageConfig;
use crate::health::DatabaseProbe;
use crate::net::link::{spawn_link, LinkState, LinkTarget, ReadyState};

pub use uri::ConnectionTarget;

/// Error type for storage setup.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no storage hosts configured")]
    NoHosts,

    #[error("invalid storage descriptor {index}: {reason}")]
    InvalidDescriptor { index: usize, reason: String },
}

/// A live storage connection handle.
#[derive(Debug)]
pub struct StorageConnection {
    target: ConnectionTarget,
    link: Arc<LinkState>,
}

impl StorageConnection {
    /// Open the connection described by `config`.
    ///
    /// Returns as soon as the target is validated; the session itself is
    /// established in the background and reflected in [`ready_state`].
    ///
    /// [`ready_state`]: StorageConnection::ready_state
    pub fn open(
        config: &StorageConfig,
        connect_timeout: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(Self, JoinHandle<()>), StorageError> {
        let target = ConnectionTarget::from_config(config)?;

        tracing::info!(uri = %target.redacted(), mongos = ?target.mongos, ssl = target.ssl, "Opening database connection");

        let link = Arc::new(LinkState::new("storage"));
        let targets = target
            .hosts
            .iter()
            .map(|(host, port)| LinkTarget::new(host.clone(), *port))
            .collect();
        let task = spawn_link(Arc::clone(&link), targets, connect_timeout, shutdown);

        Ok((Self { target, link }, task))
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn ready_state(&self) -> ReadyState {
        self.link.ready_state()
    }
}

impl DatabaseProbe for StorageConnection {
    fn database_state(&self) -> u8 {
        self.ready_state().code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageDescriptor;

    #[tokio::test]
    async fn open_rejects_empty_cluster() {
        let (_tx, rx) = broadcast::channel(1);
        let err = StorageConnection::open(&StorageConfig::Cluster(vec![]), Duration::from_secs(1), rx)
            .unwrap_err();
        assert!(matches!(err, StorageError::NoHosts));
    }

    #[tokio::test]
    async fn open_connects_in_background() {
        let backend = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = backend.local_addr().unwrap().port();
        let (tx, rx) = broadcast::channel(1);

        let config = StorageConfig::Single(StorageDescriptor {
            port,
            ..StorageDescriptor::default()
        });
        let (storage, task) = StorageConnection::open(&config, Duration::from_secs(1), rx).unwrap();
        let (_peer, _) = backend.accept().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while storage.ready_state() != ReadyState::Connected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(storage.ready_state(), ReadyState::Disconnected);
    }
}
