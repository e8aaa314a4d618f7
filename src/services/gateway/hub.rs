use crate::domain::events::ServerEvent;
use dashmap::DashMap;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Identifies one live gateway connection. Fresh for every upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug)]
struct Metrics {
    events_sent_total: Counter<u64>,
    outbound_dropped_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            events_sent_total: meter
                .u64_counter("websocket_events_sent_total")
                .with_description("Total events queued for delivery to gateway connections")
                .build(),
            outbound_dropped_total: meter
                .u64_counter("websocket_outbound_dropped_total")
                .with_description("Total events dropped due to a full or closed outbound buffer")
                .build(),
        }
    }
}

/// Outbound queues of every live connection.
#[derive(Debug)]
pub struct ConnectionHub {
    connections: DashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    metrics: Metrics,
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionHub {
    #[must_use]
    pub fn new() -> Self {
        Self { connections: DashMap::new(), metrics: Metrics::new() }
    }

    pub fn register(&self, connection_id: ConnectionId, outbound_tx: mpsc::Sender<ServerEvent>) {
        self.connections.insert(connection_id, outbound_tx);
    }

    pub fn unregister(&self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queues `event` for one connection without waiting. Returns whether it was queued.
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let Some(tx) = self.connections.get(&connection_id).map(|entry| entry.value().clone()) else {
            return false;
        };
        self.push(connection_id, &tx, event)
    }

    pub fn broadcast(&self, event: &ServerEvent) {
        // Snapshot first so no shard lock is held while queueing.
        let targets: Vec<(ConnectionId, mpsc::Sender<ServerEvent>)> =
            self.connections.iter().map(|entry| (*entry.key(), entry.value().clone())).collect();

        for (connection_id, tx) in targets {
            self.push(connection_id, &tx, event.clone());
        }
    }

    fn push(&self, connection_id: ConnectionId, tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) -> bool {
        let name = event.name();
        match tx.try_send(event) {
            Ok(()) => {
                self.metrics.events_sent_total.add(1, &[KeyValue::new("event", name)]);
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%connection_id, event = name, "Outbound buffer full, dropping event");
                self.metrics.outbound_dropped_total.add(1, &[KeyValue::new("reason", "buffer_full")]);
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(%connection_id, event = name, "Connection closed, dropping event");
                self.metrics.outbound_dropped_total.add(1, &[KeyValue::new("reason", "closed")]);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_registered_connection() {
        let hub = ConnectionHub::new();
        let conn = ConnectionId::new();
        let (tx, mut rx) = mpsc::channel(4);
        hub.register(conn, tx);

        assert!(hub.send_to(conn, ServerEvent::error("hello")));
        assert_eq!(rx.recv().await, Some(ServerEvent::error("hello")));

        hub.unregister(conn);
        assert!(!hub.send_to(conn, ServerEvent::error("gone")));
    }

    #[tokio::test]
    async fn test_full_buffer_drops_instead_of_blocking() {
        let hub = ConnectionHub::new();
        let conn = ConnectionId::new();
        let (tx, mut rx) = mpsc::channel(1);
        hub.register(conn, tx);

        assert!(hub.send_to(conn, ServerEvent::error("first")));
        assert!(!hub.send_to(conn, ServerEvent::error("second")));

        assert_eq!(rx.recv().await, Some(ServerEvent::error("first")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let hub = ConnectionHub::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::channel(4);
            hub.register(ConnectionId::new(), tx);
            receivers.push(rx);
        }

        hub.broadcast(&ServerEvent::GetOnlineUsers(Vec::new()));

        for rx in &mut receivers {
            assert_eq!(rx.recv().await, Some(ServerEvent::GetOnlineUsers(Vec::new())));
        }
    }
}
