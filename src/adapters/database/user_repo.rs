use crate::adapters::database::DbPool;
use crate::adapters::database::records::UserRecord;
use crate::domain::ports::UserStore;
use crate::domain::user::{NewUser, Role, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use uuid::Uuid;

const COLUMNS: &str = "id, full_name, email, password_hash, is_verified, role, verification_code, \
                       verification_expires_at, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[tracing::instrument(level = "debug", skip(self, user))]
    async fn create(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            INSERT INTO users (id, full_name, email, password_hash, role, verification_code, verification_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(user.full_name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(Role::User.as_str())
        .bind(user.verification_code)
        .bind(user.verification_expires_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
                Err(AppError::Conflict("User already exists".to_string()))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, email))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, ids), fields(count = ids.len()))]
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, UserRecord>(&format!("SELECT {COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self, user), fields(user_id = %user.id))]
    async fn save(&self, user: &User) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            UPDATE users
            SET full_name = $2,
                password_hash = $3,
                is_verified = $4,
                role = $5,
                verification_code = $6,
                verification_expires_at = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "
        ))
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(user.role.as_str())
        .bind(&user.verification_code)
        .bind(user.verification_expires_at)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Into::into).ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
