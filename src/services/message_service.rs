use crate::domain::message::{self, MISSING_CONTENT, Message, NewMessage};
use crate::domain::ports::{MessageStore, UserStore};
use crate::error::{AppError, Result};
use crate::services::upload_service::{ImageUpload, UploadService};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    edited_total: Counter<u64>,
    deleted_total: Counter<u64>,
    images_per_message: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            sent_total: meter
                .u64_counter("bookswap_messages_sent_total")
                .with_description("Total messages successfully persisted")
                .build(),
            edited_total: meter
                .u64_counter("bookswap_messages_edited_total")
                .with_description("Total messages edited by their sender")
                .build(),
            deleted_total: meter
                .u64_counter("bookswap_messages_deleted_total")
                .with_description("Total messages deleted by their sender")
                .build(),
            images_per_message: meter
                .u64_histogram("bookswap_message_images")
                .with_description("Number of images attached to a sent message")
                .build(),
        }
    }
}

/// Persistence rules for chat messages. Delivery is the gateway's job.
#[derive(Clone, Debug)]
pub struct MessageService {
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserStore>,
    uploads: UploadService,
    max_images: usize,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserStore>,
        uploads: UploadService,
        max_images: usize,
    ) -> Self {
        Self { messages, users, uploads, max_images, metrics: Metrics::new() }
    }

    /// Persists a validated message. Image entries are stored file names and are
    /// recorded under the public upload prefix.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, draft),
        fields(sender_id = %draft.sender_id, receiver_id = %draft.receiver_id, message_id = tracing::field::Empty)
    )]
    pub async fn send(&self, mut draft: NewMessage) -> Result<Message> {
        if draft.images.len() > self.max_images {
            return Err(AppError::BadRequest(format!("At most {} images per message", self.max_images)));
        }
        draft.images = draft.images.iter().map(|name| message::upload_path(name)).collect::<Result<_>>()?;
        self.ensure_receiver(draft.receiver_id).await?;
        self.persist(draft).await
    }

    /// Sends a message whose images arrive with the request.
    ///
    /// Every rule is checked before the first image is written, and the written
    /// images are removed again if the message cannot be stored.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, text, uploads),
        fields(image_count = uploads.len(), message_id = tracing::field::Empty)
    )]
    pub async fn send_with_uploads(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        text: Option<String>,
        uploads: Vec<ImageUpload>,
    ) -> Result<Message> {
        self.uploads.check(&uploads, self.max_images, "message")?;
        if text.as_deref().is_none_or(|t| t.trim().is_empty()) && uploads.is_empty() {
            return Err(AppError::BadRequest(MISSING_CONTENT.to_string()));
        }
        self.ensure_receiver(receiver_id).await?;

        let names = self.uploads.store_all(uploads).await?;
        let draft = names
            .iter()
            .map(|name| message::upload_path(name))
            .collect::<Result<Vec<_>>>()
            .and_then(|paths| NewMessage::new(Some(sender_id), Some(receiver_id), text, paths));
        let result = match draft {
            Ok(draft) => self.persist(draft).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.uploads.discard(&names).await;
        }
        result
    }

    /// Stores images ahead of a socket `sendMessage` that will reference them by name.
    #[tracing::instrument(err(level = "warn"), skip(self, uploads), fields(count = uploads.len()))]
    pub async fn upload_images(&self, uploads: Vec<ImageUpload>) -> Result<Vec<String>> {
        if uploads.is_empty() {
            return Err(AppError::BadRequest("At least one image is required".to_string()));
        }
        self.uploads.check(&uploads, self.max_images, "message")?;
        self.uploads.store_all(uploads).await
    }

    async fn ensure_receiver(&self, receiver_id: Uuid) -> Result<()> {
        if self.users.find_by_id(receiver_id).await?.is_none() {
            return Err(AppError::NotFound("Receiver not found".to_string()));
        }
        Ok(())
    }

    async fn persist(&self, draft: NewMessage) -> Result<Message> {
        let image_count = draft.images.len() as u64;
        let stored = self.messages.create(draft).await?;

        tracing::Span::current().record("message_id", tracing::field::display(stored.id));
        self.metrics.sent_total.add(1, &[KeyValue::new("kind", if image_count > 0 { "image" } else { "text" })]);
        self.metrics.images_per_message.record(image_count, &[]);
        Ok(stored)
    }

    /// Every message between the two users, oldest first.
    #[tracing::instrument(err, skip(self), fields(batch.count = tracing::field::Empty))]
    pub async fn conversation(&self, user_id: Uuid, other_id: Uuid) -> Result<Vec<Message>> {
        let messages = self.messages.find_conversation(user_id, other_id).await?;
        tracing::Span::current().record("batch.count", messages.len());
        Ok(messages)
    }

    /// Every message the user sent or received, newest first.
    #[tracing::instrument(err, skip(self))]
    pub async fn involving(&self, user_id: Uuid) -> Result<Vec<Message>> {
        self.messages.find_involving(user_id).await
    }

    #[tracing::instrument(err(level = "warn"), skip(self, text))]
    pub async fn edit(&self, user_id: Uuid, message_id: Uuid, text: Option<String>) -> Result<Message> {
        let existing = self.owned_message(user_id, message_id, "Unauthorized to edit this message").await?;
        let text = message::edited_text(text)?;

        let updated = self
            .messages
            .update_text(existing.id, text, OffsetDateTime::now_utc())
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

        self.metrics.edited_total.add(1, &[]);
        Ok(updated)
    }

    /// Removes a message and hands back what was removed, so the caller can tell its participants.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete(&self, user_id: Uuid, message_id: Uuid) -> Result<Message> {
        let existing = self.owned_message(user_id, message_id, "You are not allowed to delete this message").await?;

        if !self.messages.delete(existing.id).await? {
            return Err(AppError::NotFound("Message not found".to_string()));
        }

        self.metrics.deleted_total.add(1, &[]);
        Ok(existing)
    }

    async fn owned_message(&self, user_id: Uuid, message_id: Uuid, denial: &str) -> Result<Message> {
        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

        if !message.is_sent_by(user_id) {
            tracing::warn!(owner_id = %message.sender_id, "Rejected change to someone else's message");
            return Err(AppError::Forbidden(denial.to_string()));
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryMessageStore, MemoryUserStore};
    use crate::adapters::storage::LocalImageStore;
    use crate::domain::user::NewUser;
    use time::Duration;

    struct Fixture {
        service: MessageService,
        users: Arc<MemoryUserStore>,
        upload_dir: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserStore::new());
        let upload_dir = std::env::temp_dir().join(format!("bookswap-message-service-{}", Uuid::new_v4()));
        let images = Arc::new(LocalImageStore::new(&upload_dir, 1024));
        let service = MessageService::new(
            Arc::new(MemoryMessageStore::new()),
            Arc::<MemoryUserStore>::clone(&users),
            UploadService::new(images, 1024),
            2,
        );
        Fixture { service, users, upload_dir }
    }

    fn jpeg() -> ImageUpload {
        ImageUpload { file_name: Some("photo.jpg".to_string()), data: bytes::Bytes::from_static(b"jpeg") }
    }

    fn stored_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
    }

    async fn user(users: &MemoryUserStore, email: &str) -> Uuid {
        users
            .create(NewUser {
                full_name: email.to_string(),
                email: email.to_string(),
                password_hash: String::new(),
                verification_code: "000000".to_string(),
                verification_expires_at: OffsetDateTime::now_utc() + Duration::minutes(10),
            })
            .await
            .unwrap()
            .id
    }

    fn draft(sender: Uuid, receiver: Uuid, text: &str) -> NewMessage {
        NewMessage::new(Some(sender), Some(receiver), Some(text.to_string()), Vec::new()).unwrap()
    }

    #[tokio::test]
    async fn test_send_prefixes_images_and_checks_receiver() {
        let Fixture { service, users, .. } = fixture();
        let (a, b) = (user(&users, "a@x.io").await, user(&users, "b@x.io").await);

        let with_image = NewMessage::new(Some(a), Some(b), None, vec!["one.png".into()]).unwrap();
        let sent = service.send(with_image).await.unwrap();
        assert_eq!(sent.images, vec!["uploads/one.png".to_string()]);

        let err = service.send(draft(a, Uuid::new_v4(), "hi")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let too_many = NewMessage::new(Some(a), Some(b), None, vec!["1".into(), "2".into(), "3".into()]).unwrap();
        assert!(matches!(service.send(too_many).await, Err(AppError::BadRequest(_))));

        assert_eq!(service.conversation(a, b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_only_sender_may_edit() {
        let Fixture { service, users, .. } = fixture();
        let (a, b) = (user(&users, "a@x.io").await, user(&users, "b@x.io").await);
        let sent = service.send(draft(a, b, "original")).await.unwrap();

        let err = service.edit(b, sent.id, Some("hijacked".into())).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Unauthorized to edit this message"));
        assert_eq!(service.conversation(a, b).await.unwrap()[0].text.as_deref(), Some("original"));

        let err = service.edit(a, sent.id, Some("  ".into())).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let edited = service.edit(a, sent.id, Some("revised".into())).await.unwrap();
        assert!(edited.is_edited);
        assert!(edited.edited_at.is_some());
        assert_eq!(edited.text.as_deref(), Some("revised"));
    }

    #[tokio::test]
    async fn test_only_sender_may_delete() {
        let Fixture { service, users, .. } = fixture();
        let (a, b) = (user(&users, "a@x.io").await, user(&users, "b@x.io").await);
        let sent = service.send(draft(a, b, "bye")).await.unwrap();

        let err = service.delete(b, sent.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "You are not allowed to delete this message"));
        assert_eq!(service.conversation(a, b).await.unwrap().len(), 1);

        let removed = service.delete(a, sent.id).await.unwrap();
        assert_eq!(removed.id, sent.id);
        assert!(service.conversation(a, b).await.unwrap().is_empty());

        assert!(matches!(service.delete(a, sent.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejected_upload_send_writes_nothing() {
        let Fixture { service, users, upload_dir } = fixture();
        tokio::fs::create_dir_all(&upload_dir).await.unwrap();
        let (a, b) = (user(&users, "a@x.io").await, user(&users, "b@x.io").await);

        let err = service.send_with_uploads(a, Uuid::new_v4(), None, vec![jpeg()]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(stored_files(&upload_dir), 0);

        let oversized = ImageUpload { file_name: None, data: bytes::Bytes::from(vec![0_u8; 2048]) };
        let err = service.send_with_uploads(a, b, None, vec![jpeg(), oversized]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(stored_files(&upload_dir), 0);

        let sent = service.send_with_uploads(a, b, Some("look".into()), vec![jpeg()]).await.unwrap();
        assert!(sent.images[0].starts_with("uploads/"));
        assert_eq!(stored_files(&upload_dir), 1);

        let _ = tokio::fs::remove_dir_all(&upload_dir).await;
    }

    #[tokio::test]
    async fn test_upload_images_requires_at_least_one() {
        let Fixture { service, upload_dir, .. } = fixture();
        tokio::fs::create_dir_all(&upload_dir).await.unwrap();

        assert!(matches!(service.upload_images(Vec::new()).await, Err(AppError::BadRequest(_))));
        let names = service.upload_images(vec![jpeg()]).await.unwrap();
        assert!(names[0].ends_with(".jpg"));
        assert!(!names[0].contains('/'));

        let _ = tokio::fs::remove_dir_all(&upload_dir).await;
    }
}
