use crate::domain::book::{Book, BookFilter, NewBook};
use crate::domain::page::Page;
use crate::domain::ports::BookStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug)]
struct Stored {
    seq: u64,
    book: Book,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryBookStore {
    books: Arc<DashMap<Uuid, Stored>>,
    // slug -> id; doubles as the uniqueness constraint
    slugs: Arc<DashMap<String, Uuid>>,
    seq: Arc<AtomicU64>,
}

impl MemoryBookStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(&self, filter: impl Fn(&Book) -> bool) -> Vec<Book> {
        let mut found: Vec<(OffsetDateTime, u64, Book)> = self
            .books
            .iter()
            .filter(|entry| filter(&entry.book))
            .map(|entry| (entry.book.created_at, entry.seq, entry.book.clone()))
            .collect();
        found.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        found.into_iter().map(|(_, _, book)| book).collect()
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn create(&self, book: NewBook) -> Result<Book> {
        let id = Uuid::new_v4();
        match self.slugs.entry(book.slug.clone()) {
            Entry::Occupied(_) => return Err(AppError::Conflict("Book slug already exists".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = OffsetDateTime::now_utc();
        let book = Book {
            id,
            title: book.title,
            slug: book.slug,
            author: book.author,
            uploader_id: book.uploader_id,
            genre: book.genre,
            condition: book.condition,
            product_type: book.product_type,
            price: book.price,
            description: book.description,
            pages: book.pages,
            category_id: book.category_id,
            images: book.images,
            location: book.location,
            created_at: now,
            updated_at: now,
        };
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.books.insert(id, Stored { seq, book: book.clone() });
        Ok(book)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        Ok(self.books.get(&id).map(|entry| entry.book.clone()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Book>> {
        let Some(id) = self.slugs.get(slug).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Book>> {
        Ok(ids.iter().filter_map(|id| self.books.get(id).map(|entry| entry.book.clone())).collect())
    }

    async fn save(&self, book: &Book) -> Result<Book> {
        let mut entry = self.books.get_mut(&book.id).ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;
        let stored = &mut entry.book;
        let mut updated = book.clone();
        updated.slug.clone_from(&stored.slug);
        updated.uploader_id = stored.uploader_id;
        updated.created_at = stored.created_at;
        updated.updated_at = OffsetDateTime::now_utc();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let Some((_, removed)) = self.books.remove(&id) else {
            return Ok(false);
        };
        self.slugs.remove(&removed.book.slug);
        Ok(true)
    }

    async fn list_by_uploader(&self, uploader_id: Uuid) -> Result<Vec<Book>> {
        Ok(self.newest_first(|b| b.uploader_id == uploader_id))
    }

    async fn list_all(&self, exclude_uploader: Option<Uuid>) -> Result<Vec<Book>> {
        Ok(self.newest_first(|b| exclude_uploader != Some(b.uploader_id)))
    }

    async fn filter(&self, filter: &BookFilter, page: Page) -> Result<(Vec<Book>, u64)> {
        let matches = self.newest_first(|b| filter.matches(b));
        Ok((page.slice(&matches), matches.len() as u64))
    }

    async fn related(&self, book: &Book, limit: usize) -> Result<Vec<Book>> {
        let mut related = self.newest_first(|b| book.is_related_to(b));
        related.truncate(limit);
        Ok(related)
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>> {
        let query = query.to_lowercase();
        Ok(self.newest_first(|b| b.title.to_lowercase().contains(&query) || b.slug.contains(&query)))
    }

    async fn any_in_category(&self, category_id: Uuid) -> Result<bool> {
        Ok(self.books.iter().any(|entry| entry.book.category_id == category_id))
    }
}
