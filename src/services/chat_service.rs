use crate::domain::conversation::{self, ChatOrdering, ConversationSummary};
use crate::domain::ports::UserStore;
use crate::error::Result;
use crate::services::message_service::MessageService;
use crate::services::presence::PresenceRegistry;
use opentelemetry::{global, metrics::Histogram};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    chat_list_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            chat_list_size: meter
                .u64_histogram("bookswap_chat_list_size")
                .with_description("Number of conversations in a computed chat list")
                .build(),
        }
    }
}

/// Builds a user's chat list: one row per counterpart with the latest message
/// between them, annotated with live presence. Recomputed on every call.
#[derive(Clone, Debug)]
pub struct ChatService {
    message_service: MessageService,
    users: Arc<dyn UserStore>,
    presence: Arc<PresenceRegistry>,
    metrics: Metrics,
}

impl ChatService {
    #[must_use]
    pub fn new(message_service: MessageService, users: Arc<dyn UserStore>, presence: Arc<PresenceRegistry>) -> Self {
        Self { message_service, users, presence, metrics: Metrics::new() }
    }

    #[tracing::instrument(err, skip(self), fields(conversations = tracing::field::Empty))]
    pub async fn chat_users(&self, user_id: Uuid, ordering: ChatOrdering) -> Result<Vec<ConversationSummary>> {
        let messages = self.message_service.involving(user_id).await?;
        let latest = conversation::latest_per_counterpart(user_id, messages);

        let counterparts: Vec<Uuid> = latest.iter().map(|m| m.counterpart(user_id)).collect();
        let profiles: HashMap<Uuid, _> =
            self.users.find_many(&counterparts).await?.into_iter().map(|user| (user.id, user)).collect();

        let rows =
            conversation::build_summaries(user_id, latest, &profiles, |id| self.presence.is_online(id), ordering);

        tracing::Span::current().record("conversations", rows.len());
        self.metrics.chat_list_size.record(rows.len() as u64, &[]);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryMessageStore, MemoryUserStore};
    use crate::adapters::storage::LocalImageStore;
    use crate::services::upload_service::UploadService;
    use crate::domain::message::NewMessage;
    use crate::domain::user::NewUser;
    use crate::services::gateway::hub::ConnectionId;
    use time::{Duration, OffsetDateTime};

    async fn user(users: &MemoryUserStore, name: &str) -> Uuid {
        users
            .create(NewUser {
                full_name: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: String::new(),
                verification_code: "000000".to_string(),
                verification_expires_at: OffsetDateTime::now_utc() + Duration::minutes(10),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_chat_users_one_row_per_counterpart() {
        let users = Arc::new(MemoryUserStore::new());
        let presence = Arc::new(PresenceRegistry::new());
        let messages = MessageService::new(
            Arc::new(MemoryMessageStore::new()),
            Arc::<MemoryUserStore>::clone(&users),
            UploadService::new(Arc::new(LocalImageStore::new(std::env::temp_dir(), 1024)), 1024),
            4,
        );
        let service = ChatService::new(messages.clone(), Arc::<MemoryUserStore>::clone(&users), Arc::clone(&presence));

        let (me, bob, carol) = (user(&users, "me").await, user(&users, "bob").await, user(&users, "carol").await);
        for (from, to, text) in [(me, bob, "hi bob"), (carol, me, "hi from carol"), (bob, me, "hey")] {
            messages.send(NewMessage::new(Some(from), Some(to), Some(text.into()), Vec::new()).unwrap()).await.unwrap();
        }
        presence.add_user(carol, ConnectionId::new());

        let by_recency = service.chat_users(me, ChatOrdering::Recency).await.unwrap();
        assert_eq!(by_recency.len(), 2);
        assert_eq!(by_recency[0].user_id, bob);
        assert_eq!(by_recency[0].last_message.text.as_deref(), Some("hey"));
        assert_eq!(by_recency[0].full_name.as_deref(), Some("bob"));
        assert!(!by_recency[0].online);

        let online_first = service.chat_users(me, ChatOrdering::OnlineFirst).await.unwrap();
        assert_eq!(online_first[0].user_id, carol);
        assert!(online_first[0].online);
        assert_eq!(online_first[0].preview, "hi from carol");
    }

    #[tokio::test]
    async fn test_empty_history_gives_empty_list() {
        let users = Arc::new(MemoryUserStore::new());
        let messages = MessageService::new(
            Arc::new(MemoryMessageStore::new()),
            Arc::<MemoryUserStore>::clone(&users),
            UploadService::new(Arc::new(LocalImageStore::new(std::env::temp_dir(), 1024)), 1024),
            4,
        );
        let service = ChatService::new(messages, users, Arc::new(PresenceRegistry::new()));

        assert!(service.chat_users(Uuid::new_v4(), ChatOrdering::Recency).await.unwrap().is_empty());
    }
}
