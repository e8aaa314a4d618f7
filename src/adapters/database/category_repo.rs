use crate::adapters::database::DbPool;
use crate::adapters::database::records::CategoryRecord;
use crate::domain::category::{Category, NewCategory};
use crate::domain::ports::CategoryStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use uuid::Uuid;

const COLUMNS: &str = "id, name, icon, created_at, updated_at";

fn name_taken(result: sqlx::Result<Option<CategoryRecord>>) -> Result<Option<CategoryRecord>> {
    match result {
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
            Err(AppError::Conflict("Category with this name already exists".to_string()))
        }
        other => Ok(other?),
    }
}

#[derive(Clone, Debug)]
pub struct PgCategoryStore {
    pool: DbPool,
}

impl PgCategoryStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryStore for PgCategoryStore {
    #[tracing::instrument(level = "debug", skip(self, category), fields(name = %category.name))]
    async fn create(&self, category: NewCategory) -> Result<Category> {
        let result = sqlx::query_as::<_, CategoryRecord>(&format!(
            "INSERT INTO categories (id, name, icon) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(category.name)
        .bind(category.icon)
        .fetch_optional(&self.pool)
        .await;

        name_taken(result)?.map(Into::into).ok_or_else(|| AppError::InternalMsg("Insert returned no row".to_string()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>> {
        let record = sqlx::query_as::<_, CategoryRecord>(&format!("SELECT {COLUMNS} FROM categories WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list(&self) -> Result<Vec<Category>> {
        let records = sqlx::query_as::<_, CategoryRecord>(&format!("SELECT {COLUMNS} FROM categories ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self, category), fields(category_id = %category.id))]
    async fn save(&self, category: &Category) -> Result<Category> {
        let result = sqlx::query_as::<_, CategoryRecord>(&format!(
            r"
            UPDATE categories
            SET name = $2, icon = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.icon)
        .fetch_optional(&self.pool)
        .await;

        name_taken(result)?.map(Into::into).ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&self.pool).await;
        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => {
                Err(AppError::Conflict("Category is still used by books".to_string()))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }
}
