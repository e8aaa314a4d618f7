use crate::services::gateway::hub::ConnectionId;
use dashmap::DashMap;
use opentelemetry::{global, metrics::UpDownCounter};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    online_users: UpDownCounter<i64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            online_users: meter
                .i64_up_down_counter("presence_online_users")
                .with_description("Number of users with a registered gateway connection")
                .build(),
        }
    }
}

/// Which gateway connection currently speaks for each online user.
///
/// A user has at most one entry. Registering again from another connection
/// replaces the old one, and the replaced connection can no longer remove it.
#[derive(Debug)]
pub struct PresenceRegistry {
    online: DashMap<Uuid, ConnectionId>,
    metrics: Metrics,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { online: DashMap::new(), metrics: Metrics::new() }
    }

    pub fn add_user(&self, user_id: Uuid, connection_id: ConnectionId) {
        if self.online.insert(user_id, connection_id).is_none() {
            self.metrics.online_users.add(1, &[]);
        }
    }

    /// Drops the entry owned by `connection_id` and returns the user it belonged to.
    pub fn remove(&self, connection_id: ConnectionId) -> Option<Uuid> {
        let user_id = self.online.iter().find(|entry| *entry.value() == connection_id).map(|entry| *entry.key())?;

        // A reconnect may have replaced the entry between the scan and here.
        let (user_id, _) = self.online.remove_if(&user_id, |_, owner| *owner == connection_id)?;
        self.metrics.online_users.add(-1, &[]);
        Some(user_id)
    }

    #[must_use]
    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.online.contains_key(&user_id)
    }

    #[must_use]
    pub fn connection_of(&self, user_id: Uuid) -> Option<ConnectionId> {
        self.online.get(&user_id).map(|entry| *entry.value())
    }

    #[must_use]
    pub fn list(&self) -> Vec<Uuid> {
        self.online.iter().map(|entry| *entry.key()).collect()
    }
}
