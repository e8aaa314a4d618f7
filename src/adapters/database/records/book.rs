use crate::domain::book::{Book, Condition, ProductType};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct BookRecord {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) slug: String,
    pub(crate) author: Option<String>,
    pub(crate) uploader_id: Uuid,
    pub(crate) genre: Vec<String>,
    pub(crate) condition: String,
    pub(crate) product_type: String,
    pub(crate) price: f64,
    pub(crate) description: Option<String>,
    pub(crate) pages: Option<i32>,
    pub(crate) category_id: Uuid,
    pub(crate) images: Vec<String>,
    pub(crate) location: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<BookRecord> for Book {
    fn from(record: BookRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            slug: record.slug,
            author: record.author,
            uploader_id: record.uploader_id,
            genre: record.genre,
            // Both columns carry CHECK constraints.
            condition: record.condition.parse().unwrap_or(Condition::Used),
            product_type: record.product_type.parse().unwrap_or(ProductType::Exchange),
            price: record.price,
            description: record.description,
            pages: record.pages,
            category_id: record.category_id,
            images: record.images,
            location: record.location,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
