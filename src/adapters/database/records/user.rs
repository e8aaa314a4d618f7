use crate::domain::user::{Role, User};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) is_verified: bool,
    pub(crate) role: String,
    pub(crate) verification_code: Option<String>,
    pub(crate) verification_expires_at: Option<OffsetDateTime>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            full_name: record.full_name,
            email: record.email,
            password_hash: record.password_hash,
            is_verified: record.is_verified,
            // The column carries a CHECK constraint; anything else is treated as a plain user.
            role: record.role.parse().unwrap_or(Role::User),
            verification_code: record.verification_code,
            verification_expires_at: record.verification_expires_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
