// src/coordinator/status.rs
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use crate::config::DOMAIN;
use crate::models::entry::ServerIdentity;
use crate::models::snapshot::ServerSnapshot;
use crate::protocol::StatusQuery;
use super::{unix_now, Listener, Listeners, Refresh};

/// Queries one server once. Every failure becomes the offline snapshot.
pub async fn poll_status(query: &dyn StatusQuery, identity: &ServerIdentity, timeout: Duration) -> ServerSnapshot {
    match query.status(&identity.host, identity.port, timeout).await {
        Ok(reply) => ServerSnapshot::from_status(&reply.response, reply.latency_ms),
        Err(e) => {
            debug!("{} is offline: {}", identity, e);
            ServerSnapshot::offline()
        }
    }
}

/// Latest snapshot of one configured server.
pub struct StatusCoordinator {
    identity: ServerIdentity,
    interval: Duration,
    timeout: Duration,
    query: Arc<dyn StatusQuery>,
    data: RwLock<Option<ServerSnapshot>>,
    updated_at: RwLock<Option<u64>>,
    listeners: Listeners<ServerSnapshot>,
}

impl StatusCoordinator {
    pub fn new(identity: ServerIdentity, interval: Duration, timeout: Duration, query: Arc<dyn StatusQuery>) -> Self {
        Self {
            identity,
            interval,
            timeout,
            query,
            data: RwLock::new(None),
            updated_at: RwLock::new(None),
            listeners: Listeners::default(),
        }
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Latest snapshot, offline before the first poll.
    pub fn data(&self) -> ServerSnapshot {
        self.data.read().clone().unwrap_or_default()
    }

    pub fn updated_at(&self) -> Option<u64> {
        *self.updated_at.read()
    }

    pub fn add_listener(&self, listener: Listener<ServerSnapshot>) {
        self.listeners.add(listener);
    }
}

#[async_trait]
impl Refresh for StatusCoordinator {
    fn name(&self) -> String {
        format!("{}_{}_{}", DOMAIN, self.identity.host, self.identity.port)
    }

    fn update_interval(&self) -> Duration {
        self.interval
    }

    async fn refresh(&self) {
        let snapshot = poll_status(self.query.as_ref(), &self.identity, self.timeout).await;
        *self.data.write() = Some(snapshot.clone());
        *self.updated_at.write() = Some(unix_now());
        self.listeners.notify(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::FakeQuery;

    #[tokio::test]
    async fn failed_query_yields_offline_snapshot() {
        let query = FakeQuery::with_ports(&[]);
        let snapshot = poll_status(&query, &ServerIdentity::new("127.0.0.1", 25565), Duration::from_secs(1)).await;
        assert_eq!(snapshot, ServerSnapshot::offline());
    }

    #[tokio::test]
    async fn refresh_replaces_snapshot_and_notifies() {
        let query = Arc::new(FakeQuery::with_ports(&[25565]));
        let coordinator = StatusCoordinator::new(
            ServerIdentity::new("127.0.0.1", 25565),
            Duration::from_secs(60),
            Duration::from_secs(1),
            query.clone(),
        );
        assert!(coordinator.updated_at().is_none());
        assert!(!coordinator.data().online);

        let seen = Arc::new(RwLock::new(Vec::new()));
        let sink = seen.clone();
        coordinator.add_listener(Arc::new(move |s: &ServerSnapshot| sink.write().push(s.online)));

        coordinator.refresh().await;
        let snapshot = coordinator.data();
        assert!(snapshot.online);
        assert_eq!(snapshot.players_online, 1);
        assert_eq!(snapshot.player_names, vec!["Alex"]);
        assert!(coordinator.updated_at().is_some());

        query.set_open(&[]);
        coordinator.refresh().await;
        assert!(!coordinator.data().online);
        assert_eq!(*seen.read(), vec![true, false]);
    }

    #[test]
    fn named_after_the_server() {
        let coordinator = StatusCoordinator::new(
            ServerIdentity::new("h", 25565),
            Duration::from_secs(60),
            Duration::from_secs(1),
            Arc::new(FakeQuery::default()),
        );
        assert_eq!(coordinator.update_interval(), Duration::from_secs(60));
        assert_eq!(coordinator.name(), "mc_server_stats_h_25565");
    }
}
