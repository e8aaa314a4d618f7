use crate::domain::category::{Category, NewCategory};
use crate::domain::ports::CategoryStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

const NAME_TAKEN: &str = "Category with this name already exists";

#[derive(Clone, Debug, Default)]
pub struct MemoryCategoryStore {
    categories: Arc<DashMap<Uuid, Category>>,
    // name -> id; doubles as the uniqueness constraint
    names: Arc<DashMap<String, Uuid>>,
}

impl MemoryCategoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryStore for MemoryCategoryStore {
    async fn create(&self, category: NewCategory) -> Result<Category> {
        let id = Uuid::new_v4();
        match self.names.entry(category.name.clone()) {
            Entry::Occupied(_) => return Err(AppError::Conflict(NAME_TAKEN.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = OffsetDateTime::now_utc();
        let category = Category { id, name: category.name, icon: category.icon, created_at: now, updated_at: now };
        self.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.categories.get(&id).map(|c| c.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = self.categories.iter().map(|c| c.value().clone()).collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn save(&self, category: &Category) -> Result<Category> {
        let previous_name = self
            .categories
            .get(&category.id)
            .map(|c| c.name.clone())
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        if previous_name != category.name {
            match self.names.entry(category.name.clone()) {
                Entry::Occupied(_) => return Err(AppError::Conflict(NAME_TAKEN.to_string())),
                Entry::Vacant(slot) => {
                    slot.insert(category.id);
                }
            }
            self.names.remove(&previous_name);
        }

        let mut stored =
            self.categories.get_mut(&category.id).ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        stored.name.clone_from(&category.name);
        stored.icon.clone_from(&category.icon);
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let Some((_, removed)) = self.categories.remove(&id) else {
            return Ok(false);
        };
        self.names.remove(&removed.name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> NewCategory {
        NewCategory { name: name.to_string(), icon: None }
    }

    #[tokio::test]
    async fn test_names_are_unique_across_create_and_rename() {
        let store = MemoryCategoryStore::new();
        let fantasy = store.create(named("fantasy")).await.unwrap();
        let mut poetry = store.create(named("poetry")).await.unwrap();

        assert!(matches!(store.create(named("fantasy")).await, Err(AppError::Conflict(_))));

        poetry.name = "fantasy".to_string();
        assert!(matches!(store.save(&poetry).await, Err(AppError::Conflict(_))));

        poetry.name = "verse".to_string();
        store.save(&poetry).await.unwrap();
        store.create(named("poetry")).await.unwrap();

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["fantasy", "poetry", "verse"]);

        assert!(store.delete(fantasy.id).await.unwrap());
        assert!(!store.delete(fantasy.id).await.unwrap());
        store.create(named("fantasy")).await.unwrap();
    }
}
