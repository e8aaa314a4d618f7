use crate::domain::category::{self, Category, NewCategory};
use crate::domain::message::upload_path;
use crate::domain::ports::{BookStore, CategoryStore};
use crate::error::{AppError, Result};
use crate::services::upload_service::{ImageUpload, UploadService};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    changes_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            changes_total: meter
                .u64_counter("bookswap_category_changes_total")
                .with_description("Total category creations, updates and deletions")
                .build(),
        }
    }
}

/// Category catalogue. Callers are expected to have checked for the admin role before mutating.
#[derive(Clone, Debug)]
pub struct CategoryService {
    categories: Arc<dyn CategoryStore>,
    books: Arc<dyn BookStore>,
    uploads: UploadService,
    metrics: Metrics,
}

impl CategoryService {
    #[must_use]
    pub fn new(categories: Arc<dyn CategoryStore>, books: Arc<dyn BookStore>, uploads: UploadService) -> Self {
        Self { categories, books, uploads, metrics: Metrics::new() }
    }

    #[tracing::instrument(err(level = "warn"), skip(self, name, icon), fields(category_id = tracing::field::Empty))]
    pub async fn create(&self, name: Option<String>, icon: Option<ImageUpload>) -> Result<Category> {
        let Some(name) = name.as_deref().and_then(category::normalize_name) else {
            return Err(AppError::BadRequest("All fields are required".to_string()));
        };
        let icons: Vec<ImageUpload> = icon.into_iter().collect();
        self.uploads.check(&icons, 1, "category")?;

        let stored = self.uploads.store_all(icons).await?;
        let result = match stored.first().map(|n| upload_path(n)).transpose() {
            Ok(icon) => self.categories.create(NewCategory { name, icon }).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.uploads.discard(&stored).await;
        }
        let created = result?;

        tracing::Span::current().record("category_id", tracing::field::display(created.id));
        self.metrics.changes_total.add(1, &[KeyValue::new("change", "create")]);
        Ok(created)
    }

    #[tracing::instrument(err, skip(self))]
    pub async fn list(&self) -> Result<Vec<Category>> {
        self.categories.list().await
    }

    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Category> {
        self.categories.find_by_id(id).await?.ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    /// Renames the category and/or replaces its icon.
    #[tracing::instrument(err(level = "warn"), skip(self, name, icon))]
    pub async fn update(&self, id: Uuid, name: Option<String>, icon: Option<ImageUpload>) -> Result<Category> {
        let mut existing = self.get(id).await?;
        if let Some(name) = name {
            existing.name = category::normalize_name(&name)
                .ok_or_else(|| AppError::BadRequest("Category name cannot be empty".to_string()))?;
        }
        let icons: Vec<ImageUpload> = icon.into_iter().collect();
        self.uploads.check(&icons, 1, "category")?;

        let stored = self.uploads.store_all(icons).await?;
        let result = match stored.first().map(|n| upload_path(n)).transpose() {
            Ok(icon) => {
                if icon.is_some() {
                    existing.icon = icon;
                }
                self.categories.save(&existing).await
            }
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.uploads.discard(&stored).await;
        }
        let updated = result?;

        self.metrics.changes_total.add(1, &[KeyValue::new("change", "update")]);
        Ok(updated)
    }

    /// # Errors
    /// Returns `AppError::Conflict` while books still reference the category.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<Category> {
        let existing = self.get(id).await?;
        if self.books.any_in_category(id).await? {
            return Err(AppError::Conflict("Category is still used by books".to_string()));
        }
        if !self.categories.delete(id).await? {
            return Err(AppError::NotFound("Category not found".to_string()));
        }

        self.metrics.changes_total.add(1, &[KeyValue::new("change", "delete")]);
        Ok(existing)
    }
}
