use crate::adapters::database::DbPool;
use crate::adapters::database::records::BookRequestRecord;
use crate::domain::book_request::{BookRequest, NewBookRequest, RequestStatus};
use crate::domain::page::Page;
use crate::domain::ports::BookRequestStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use uuid::Uuid;

const COLUMNS: &str = "id, book_id, requester_id, owner_id, status, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgBookRequestStore {
    pool: DbPool,
}

impl PgBookRequestStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_newest_first(&self, condition: &str, user_id: Uuid) -> Result<Vec<BookRequest>> {
        let records = sqlx::query_as::<_, BookRequestRecord>(&format!(
            "SELECT {COLUMNS} FROM book_requests WHERE {condition} ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl BookRequestStore for PgBookRequestStore {
    #[tracing::instrument(level = "debug", skip(self, request), fields(book_id = %request.book_id))]
    async fn create(&self, request: NewBookRequest) -> Result<BookRequest> {
        let result = sqlx::query_as::<_, BookRequestRecord>(&format!(
            r"
            INSERT INTO book_requests (id, book_id, requester_id, owner_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "
        ))
        .bind(Uuid::now_v7())
        .bind(request.book_id)
        .bind(request.requester_id)
        .bind(request.owner_id)
        .bind(RequestStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
                Err(AppError::Conflict("You already requested this book.".to_string()))
            }
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => {
                Err(AppError::NotFound("Book not found".to_string()))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<BookRequest>> {
        let record =
            sqlx::query_as::<_, BookRequestRecord>(&format!("SELECT {COLUMNS} FROM book_requests WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_for(&self, book_id: Uuid, requester_id: Uuid) -> Result<Option<BookRequest>> {
        let record = sqlx::query_as::<_, BookRequestRecord>(&format!(
            "SELECT {COLUMNS} FROM book_requests WHERE book_id = $1 AND requester_id = $2"
        ))
        .bind(book_id)
        .bind(requester_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn set_status(&self, id: Uuid, status: RequestStatus) -> Result<Option<BookRequest>> {
        let record = sqlx::query_as::<_, BookRequestRecord>(&format!(
            "UPDATE book_requests SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM book_requests WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM book_requests WHERE book_id = $1").bind(book_id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_involving(&self, user_id: Uuid) -> Result<Vec<BookRequest>> {
        self.fetch_newest_first("requester_id = $1 OR owner_id = $1", user_id).await
    }

    #[tracing::instrument(level = "debug", skip(self, book_ids), fields(count = book_ids.len()))]
    async fn list_involving_books(&self, user_id: Uuid, book_ids: &[Uuid]) -> Result<Vec<BookRequest>> {
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, BookRequestRecord>(&format!(
            r"
            SELECT {COLUMNS}
            FROM book_requests
            WHERE (requester_id = $1 OR owner_id = $1) AND book_id = ANY($2)
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .bind(book_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(page = page.number, limit = page.limit))]
    async fn list_received(&self, owner_id: Uuid, page: Page) -> Result<(Vec<BookRequest>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_requests WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        let records = sqlx::query_as::<_, BookRequestRecord>(&format!(
            r"
            SELECT {COLUMNS}
            FROM book_requests
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(owner_id)
        .bind(i64::from(page.limit))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok((records.into_iter().map(Into::into).collect(), u64::try_from(total).unwrap_or_default()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_sent(&self, requester_id: Uuid) -> Result<Vec<BookRequest>> {
        self.fetch_newest_first("requester_id = $1", requester_id).await
    }
}
