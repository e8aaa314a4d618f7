use crate::adapters::database::DbPool;
use crate::adapters::database::records::BookRecord;
use crate::domain::book::{Book, BookFilter, NewBook};
use crate::domain::page::Page;
use crate::domain::ports::BookStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use uuid::Uuid;

const COLUMNS: &str = "id, title, slug, author, uploader_id, genre, condition, product_type, price, description, \
                       pages, category_id, images, location, created_at, updated_at";

/// Every criterion is skipped when its parameter is NULL.
const FILTER_CLAUSE: &str = r"
    ($1::text IS NULL OR title ILIKE $1)
    AND ($2::uuid IS NULL OR category_id = $2)
    AND ($3::float8 IS NULL OR price >= $3)
    AND ($4::float8 IS NULL OR price <= $4)
    AND ($5::int4 IS NULL OR pages >= $5)
    AND ($6::int4 IS NULL OR pages <= $6)
    AND ($7::text IS NULL OR product_type = $7)
    AND ($8::text IS NULL OR condition = $8)
    AND ($9::uuid IS NULL OR uploader_id = $9)
    AND ($10::text IS NULL OR author ILIKE $10)
";

/// `ILIKE` pattern matching `needle` anywhere, with wildcards in the needle taken literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

macro_rules! bind_filter {
    ($query:expr, $filter:expr) => {
        $query
            .bind($filter.search.as_deref().map(contains_pattern))
            .bind($filter.category_id)
            .bind($filter.min_price)
            .bind($filter.max_price)
            .bind($filter.min_pages)
            .bind($filter.max_pages)
            .bind($filter.product_type.map(|t| t.as_str()))
            .bind($filter.condition.map(|c| c.as_str()))
            .bind($filter.uploader_id)
            .bind($filter.author.as_deref().map(contains_pattern))
    };
}

fn map_write_error(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            AppError::Conflict("Book slug already exists".to_string())
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
            AppError::NotFound("Category not found".to_string())
        }
        _ => AppError::Database(e),
    }
}

#[derive(Clone, Debug)]
pub struct PgBookStore {
    pool: DbPool,
}

impl PgBookStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    #[tracing::instrument(level = "debug", skip(self, book), fields(slug = %book.slug))]
    async fn create(&self, book: NewBook) -> Result<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            r"
            INSERT INTO books (id, title, slug, author, uploader_id, genre, condition, product_type, price,
                               description, pages, category_id, images, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {COLUMNS}
            "
        ))
        .bind(Uuid::now_v7())
        .bind(book.title)
        .bind(book.slug)
        .bind(book.author)
        .bind(book.uploader_id)
        .bind(book.genre)
        .bind(book.condition.as_str())
        .bind(book.product_type.as_str())
        .bind(book.price)
        .bind(book.description)
        .bind(book.pages)
        .bind(book.category_id)
        .bind(book.images)
        .bind(book.location)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(record.into())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        let record = sqlx::query_as::<_, BookRecord>(&format!("SELECT {COLUMNS} FROM books WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Book>> {
        let record = sqlx::query_as::<_, BookRecord>(&format!("SELECT {COLUMNS} FROM books WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, ids), fields(count = ids.len()))]
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Book>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, BookRecord>(&format!("SELECT {COLUMNS} FROM books WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self, book), fields(book_id = %book.id))]
    async fn save(&self, book: &Book) -> Result<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            r"
            UPDATE books
            SET title = $2,
                author = $3,
                genre = $4,
                condition = $5,
                product_type = $6,
                price = $7,
                description = $8,
                pages = $9,
                category_id = $10,
                images = $11,
                location = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "
        ))
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(book.condition.as_str())
        .bind(book.product_type.as_str())
        .bind(book.price)
        .bind(&book.description)
        .bind(book.pages)
        .bind(book.category_id)
        .bind(&book.images)
        .bind(&book.location)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        record.map(Into::into).ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_by_uploader(&self, uploader_id: Uuid) -> Result<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {COLUMNS} FROM books WHERE uploader_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(uploader_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_all(&self, exclude_uploader: Option<Uuid>) -> Result<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            r"
            SELECT {COLUMNS}
            FROM books
            WHERE $1::uuid IS NULL OR uploader_id <> $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(exclude_uploader)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self, filter), fields(page = page.number, limit = page.limit))]
    async fn filter(&self, filter: &BookFilter, page: Page) -> Result<(Vec<Book>, u64)> {
        let count_sql = format!("SELECT COUNT(*) FROM books WHERE {FILTER_CLAUSE}");
        let total: i64 = bind_filter!(sqlx::query_scalar::<_, i64>(&count_sql), filter).fetch_one(&self.pool).await?;

        let page_sql = format!(
            "SELECT {COLUMNS} FROM books WHERE {FILTER_CLAUSE} ORDER BY created_at DESC, id DESC LIMIT $11 OFFSET $12"
        );
        let records = bind_filter!(sqlx::query_as::<_, BookRecord>(&page_sql), filter)
            .bind(i64::from(page.limit))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok((records.into_iter().map(Into::into).collect(), u64::try_from(total).unwrap_or_default()))
    }

    #[tracing::instrument(level = "debug", skip(self, book), fields(book_id = %book.id))]
    async fn related(&self, book: &Book, limit: usize) -> Result<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            r"
            SELECT {COLUMNS}
            FROM books
            WHERE id <> $1 AND (category_id = $2 OR genre && $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "
        ))
        .bind(book.id)
        .bind(book.category_id)
        .bind(&book.genre)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            r"
            SELECT {COLUMNS}
            FROM books
            WHERE title ILIKE $1 OR slug ILIKE $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn any_in_category(&self, category_id: Uuid) -> Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM books WHERE category_id = $1)")
            .bind(category_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("dune"), "%dune%");
        assert_eq!(contains_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
