use crate::domain::category::Category;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct CategoryRecord {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) icon: Option<String>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<CategoryRecord> for Category {
    fn from(record: CategoryRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            icon: record.icon,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
