use crate::domain::message::Message;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: Uuid,
    pub(crate) sender_id: Uuid,
    pub(crate) receiver_id: Uuid,
    pub(crate) text: Option<String>,
    pub(crate) images: Vec<String>,
    pub(crate) is_edited: bool,
    pub(crate) edited_at: Option<OffsetDateTime>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            text: record.text,
            images: record.images,
            is_edited: record.is_edited,
            edited_at: record.edited_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
