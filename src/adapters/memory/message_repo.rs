use crate::domain::message::{Message, NewMessage};
use crate::domain::ports::MessageStore;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug)]
struct Stored {
    seq: u64,
    message: Message,
}

/// Insertion sequence breaks ties between messages created within the same clock tick.
#[derive(Clone, Debug, Default)]
pub struct MemoryMessageStore {
    messages: Arc<DashMap<Uuid, Stored>>,
    seq: Arc<AtomicU64>,
}

impl MemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_sorted(&self, filter: impl Fn(&Message) -> bool) -> Vec<Message> {
        let mut found: Vec<(OffsetDateTime, u64, Message)> = self
            .messages
            .iter()
            .filter(|entry| filter(&entry.message))
            .map(|entry| (entry.message.created_at, entry.seq, entry.message.clone()))
            .collect();
        found.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        found.into_iter().map(|(_, _, m)| m).collect()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create(&self, message: NewMessage) -> Result<Message> {
        let now = OffsetDateTime::now_utc();
        let message = Message {
            id: Uuid::now_v7(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            text: message.text,
            images: message.images,
            is_edited: false,
            edited_at: None,
            created_at: now,
            updated_at: now,
        };
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.messages.insert(message.id, Stored { seq, message: message.clone() });
        Ok(message)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.messages.get(&id).map(|entry| entry.message.clone()))
    }

    async fn update_text(&self, id: Uuid, text: String, edited_at: OffsetDateTime) -> Result<Option<Message>> {
        Ok(self.messages.get_mut(&id).map(|mut entry| {
            let message = &mut entry.message;
            message.text = Some(text);
            message.is_edited = true;
            message.edited_at = Some(edited_at);
            message.updated_at = edited_at;
            message.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.messages.remove(&id).is_some())
    }

    async fn find_conversation(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>> {
        Ok(self.collect_sorted(|m| {
            (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
        }))
    }

    async fn find_involving(&self, user_id: Uuid) -> Result<Vec<Message>> {
        let mut messages = self.collect_sorted(|m| m.involves(user_id));
        messages.reverse();
        Ok(messages)
    }
}
