use crate::domain::book_request::{BookRequest, RequestStatus};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct BookRequestRecord {
    pub(crate) id: Uuid,
    pub(crate) book_id: Uuid,
    pub(crate) requester_id: Uuid,
    pub(crate) owner_id: Uuid,
    pub(crate) status: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<BookRequestRecord> for BookRequest {
    fn from(record: BookRequestRecord) -> Self {
        Self {
            id: record.id,
            book_id: record.book_id,
            requester_id: record.requester_id,
            owner_id: record.owner_id,
            status: record.status.parse().unwrap_or_default(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
