use crate::domain::book_request::{BookRequest, NewBookRequest, RequestStatus};
use crate::domain::page::Page;
use crate::domain::ports::BookRequestStore;
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
    request: BookRequest,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryBookRequestStore {
    requests: Arc<DashMap<Uuid, Stored>>,
    // (book, requester) -> id; doubles as the uniqueness constraint
    pairs: Arc<DashMap<(Uuid, Uuid), Uuid>>,
    seq: Arc<AtomicU64>,
}

impl MemoryBookRequestStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(&self, filter: impl Fn(&BookRequest) -> bool) -> Vec<BookRequest> {
        let mut found: Vec<(OffsetDateTime, u64, BookRequest)> = self
            .requests
            .iter()
            .filter(|entry| filter(&entry.request))
            .map(|entry| (entry.request.created_at, entry.seq, entry.request.clone()))
            .collect();
        found.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        found.into_iter().map(|(_, _, request)| request).collect()
    }

    fn remove(&self, id: Uuid) -> bool {
        let Some((_, removed)) = self.requests.remove(&id) else {
            return false;
        };
        self.pairs.remove(&(removed.request.book_id, removed.request.requester_id));
        true
    }
}

#[async_trait]
impl BookRequestStore for MemoryBookRequestStore {
    async fn create(&self, request: NewBookRequest) -> Result<BookRequest> {
        let id = Uuid::new_v4();
        match self.pairs.entry((request.book_id, request.requester_id)) {
            Entry::Occupied(_) => return Err(AppError::Conflict("You already requested this book.".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = OffsetDateTime::now_utc();
        let request = BookRequest {
            id,
            book_id: request.book_id,
            requester_id: request.requester_id,
            owner_id: request.owner_id,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.requests.insert(id, Stored { seq, request: request.clone() });
        Ok(request)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BookRequest>> {
        Ok(self.requests.get(&id).map(|entry| entry.request.clone()))
    }

    async fn find_for(&self, book_id: Uuid, requester_id: Uuid) -> Result<Option<BookRequest>> {
        let Some(id) = self.pairs.get(&(book_id, requester_id)).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn set_status(&self, id: Uuid, status: RequestStatus) -> Result<Option<BookRequest>> {
        Ok(self.requests.get_mut(&id).map(|mut entry| {
            entry.request.status = status;
            entry.request.updated_at = OffsetDateTime::now_utc();
            entry.request.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.remove(id))
    }

    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64> {
        let ids: Vec<Uuid> =
            self.requests.iter().filter(|entry| entry.request.book_id == book_id).map(|entry| *entry.key()).collect();
        Ok(ids.into_iter().filter(|id| self.remove(*id)).count() as u64)
    }

    async fn list_involving(&self, user_id: Uuid) -> Result<Vec<BookRequest>> {
        Ok(self.newest_first(|r| r.involves(user_id)))
    }

    async fn list_involving_books(&self, user_id: Uuid, book_ids: &[Uuid]) -> Result<Vec<BookRequest>> {
        Ok(self.newest_first(|r| r.involves(user_id) && book_ids.contains(&r.book_id)))
    }

    async fn list_received(&self, owner_id: Uuid, page: Page) -> Result<(Vec<BookRequest>, u64)> {
        let received = self.newest_first(|r| r.owner_id == owner_id);
        Ok((page.slice(&received), received.len() as u64))
    }

    async fn list_sent(&self, requester_id: Uuid) -> Result<Vec<BookRequest>> {
        Ok(self.newest_first(|r| r.requester_id == requester_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(book_id: Uuid, requester_id: Uuid, owner_id: Uuid) -> NewBookRequest {
        NewBookRequest { book_id, requester_id, owner_id }
    }

    #[tokio::test]
    async fn test_one_request_per_book_and_requester() {
        let store = MemoryBookRequestStore::new();
        let (book, reader, owner) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let first = store.create(ask(book, reader, owner)).await.unwrap();
        assert_eq!(first.status, RequestStatus::Pending);
        assert!(matches!(store.create(ask(book, reader, owner)).await, Err(AppError::Conflict(_))));
        assert_eq!(store.find_for(book, reader).await.unwrap().unwrap().id, first.id);

        assert!(store.delete(first.id).await.unwrap());
        assert!(store.find_for(book, reader).await.unwrap().is_none());
        store.create(ask(book, reader, owner)).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_lists_and_book_cleanup() {
        let store = MemoryBookRequestStore::new();
        let (owner, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (book1, book2) = (Uuid::new_v4(), Uuid::new_v4());

        let r1 = store.create(ask(book1, a, owner)).await.unwrap();
        store.create(ask(book1, b, owner)).await.unwrap();
        store.create(ask(book2, a, owner)).await.unwrap();

        let approved = store.set_status(r1.id, RequestStatus::Approved).await.unwrap().unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(store.set_status(Uuid::new_v4(), RequestStatus::Rejected).await.unwrap().is_none());

        let (page, total) = store.list_received(owner, Page::new(Some(1), Some(2))).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].book_id, book2);

        assert_eq!(store.list_sent(a).await.unwrap().len(), 2);
        assert_eq!(store.list_involving(b).await.unwrap().len(), 1);
        assert_eq!(store.list_involving_books(a, &[book1]).await.unwrap().len(), 1);

        assert_eq!(store.delete_for_book(book1).await.unwrap(), 2);
        assert_eq!(store.list_involving(owner).await.unwrap().len(), 1);
        store.create(ask(book1, a, owner)).await.unwrap();
    }
}
