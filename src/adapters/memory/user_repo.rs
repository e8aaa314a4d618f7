use crate::domain::ports::UserStore;
use crate::domain::user::{NewUser, Role, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct MemoryUserStore {
    users: Arc<DashMap<Uuid, User>>,
    // email -> id; doubles as the uniqueness constraint
    emails: Arc<DashMap<String, Uuid>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let id = Uuid::new_v4();
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => return Err(AppError::Conflict("User already exists".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id,
            full_name: user.full_name,
            email: user.email,
            password_hash: user.password_hash,
            is_verified: false,
            role: Role::User,
            verification_code: Some(user.verification_code),
            verification_expires_at: Some(user.verification_expires_at),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(id) = self.emails.get(email).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        Ok(ids.iter().filter_map(|id| self.users.get(id).map(|u| u.value().clone())).collect())
    }

    async fn save(&self, user: &User) -> Result<User> {
        let mut stored = self.users.get_mut(&user.id).ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let mut updated = user.clone();
        // Email and creation time are immutable.
        updated.email.clone_from(&stored.email);
        updated.created_at = stored.created_at;
        updated.updated_at = OffsetDateTime::now_utc();
        *stored = updated.clone();
        Ok(updated)
    }
}
