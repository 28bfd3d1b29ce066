//! Pending response registry.
//!
//! Every in-flight response is tracked under a fresh id together with weak
//! handles to its connection and response status. A dropped handle counts
//! as the inactive half.
//!
//! Two pruning rules apply:
//! - the periodic sweep only reclaims entries whose connection is destroyed
//!   AND whose response is finished;
//! - `count` drops every entry that has settled on either side (connection
//!   destroyed OR response finished) and reports what is still in flight.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::net::ConnectionStatus;

/// Opaque registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseId(Uuid);

impl ResponseId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion flag for one response.
#[derive(Debug, Default)]
pub struct ResponseStatus {
    finished: AtomicBool,
}

impl ResponseStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct PendingEntry {
    connection: Weak<ConnectionStatus>,
    response: Weak<ResponseStatus>,
}

impl PendingEntry {
    fn connection_destroyed(&self) -> bool {
        self.connection
            .upgrade()
            .map_or(true, |connection| connection.is_destroyed())
    }

    fn response_finished(&self) -> bool {
        self.response
            .upgrade()
            .map_or(true, |response| response.is_finished())
    }

    fn is_pending(&self) -> bool {
        !(self.connection_destroyed() && self.response_finished())
    }

    fn is_in_flight(&self) -> bool {
        !(self.connection_destroyed() || self.response_finished())
    }
}

/// Concurrent map of in-flight responses.
#[derive(Debug, Default)]
pub struct ResponseRegistry {
    entries: DashMap<ResponseId, PendingEntry>,
}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a response. The registry never keeps either handle alive.
    pub fn track(
        &self,
        connection: &Arc<ConnectionStatus>,
        response: &Arc<ResponseStatus>,
    ) -> ResponseId {
        let id = ResponseId::new();
        self.entries.insert(
            id,
            PendingEntry {
                connection: Arc::downgrade(connection),
                response: Arc::downgrade(response),
            },
        );
        id
    }

    /// Drop every settled entry and return how many are still in flight.
    pub fn count(&self) -> usize {
        self.entries.retain(|_, entry| entry.is_in_flight());
        self.entries.len()
    }

    /// Remove every entry whose connection is destroyed and response finished.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_pending());
        before.saturating_sub(self.entries.len())
    }

    /// Entry count without pruning.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &ResponseId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn remove(&self, id: &ResponseId) {
        self.entries.remove(id);
    }
}

/// Sweep the registry every `interval` until shutdown.
pub fn spawn_sweeper(
    registry: Arc<ResponseRegistry>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(interval_secs = interval.as_secs(), "Response sweep armed");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let removed = registry.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = registry.len(), "Swept finished responses");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Response sweep stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles(destroyed: bool, finished: bool) -> (Arc<ConnectionStatus>, Arc<ResponseStatus>) {
        let connection = ConnectionStatus::new();
        let response = ResponseStatus::new();
        if destroyed {
            connection.mark_destroyed();
        }
        if finished {
            response.mark_finished();
        }
        (connection, response)
    }

    #[test]
    fn count_drops_settled_entries() {
        let registry = ResponseRegistry::new();

        let pending = handles(false, false);
        let done = handles(true, true);
        let destroyed_only = handles(true, false);

        let pending_id = registry.track(&pending.0, &pending.1);
        registry.track(&done.0, &done.1);
        registry.track(&destroyed_only.0, &destroyed_only.1);

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&pending_id));
    }

    #[test]
    fn count_drops_finished_only_entries() {
        let registry = ResponseRegistry::new();
        let finished_only = handles(false, true);
        registry.track(&finished_only.0, &finished_only.1);

        assert_eq!(registry.count(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn sweep_keeps_half_inactive_entries() {
        let registry = ResponseRegistry::new();

        let pending = handles(false, false);
        let done = handles(true, true);
        let destroyed_only = handles(true, false);
        let finished_only = handles(false, true);

        let pending_id = registry.track(&pending.0, &pending.1);
        let done_id = registry.track(&done.0, &done.1);
        let destroyed_id = registry.track(&destroyed_only.0, &destroyed_only.1);
        let finished_id = registry.track(&finished_only.0, &finished_only.1);

        assert_eq!(registry.sweep(), 1);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains(&pending_id));
        assert!(!registry.contains(&done_id));
        assert!(registry.contains(&destroyed_id));
        assert!(registry.contains(&finished_id));
    }

    #[test]
    fn dropped_handles_count_as_inactive() {
        let registry = ResponseRegistry::new();
        let (connection, response) = handles(false, false);
        registry.track(&connection, &response);
        assert_eq!(registry.count(), 1);

        drop(response);
        assert_eq!(registry.sweep(), 0);
        assert_eq!(registry.len(), 1);

        drop(connection);
        assert_eq!(registry.sweep(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn removing_absent_entry_is_noop() {
        let registry = ResponseRegistry::new();
        let (connection, response) = handles(false, false);
        let id = registry.track(&connection, &response);
        registry.remove(&id);
        registry.remove(&id);
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_are_unique_uuid_strings() {
        let registry = ResponseRegistry::new();
        let (connection, response) = handles(false, false);
        let first = registry.track(&connection, &response);
        let second = registry.track(&connection, &response);
        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first.to_string()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_interval() {
        let registry = Arc::new(ResponseRegistry::new());
        let done = handles(true, true);
        let pending = handles(false, false);
        let destroyed_only = handles(true, false);
        let done_id = registry.track(&done.0, &done.1);
        let pending_id = registry.track(&pending.0, &pending.1);
        let destroyed_id = registry.track(&destroyed_only.0, &destroyed_only.1);

        let (tx, rx) = broadcast::channel(1);
        let task = spawn_sweeper(registry.clone(), Duration::from_secs(30), rx);
        tokio::task::yield_now().await;

        assert_eq!(registry.len(), 3);

        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(&done_id));
        assert!(registry.contains(&pending_id));
        assert!(registry.contains(&destroyed_id));

        tx.send(()).unwrap();
        task.await.unwrap();
    }
}
