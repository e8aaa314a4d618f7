use crate::domain::book_request::{BookRequest, NewBookRequest, RequestListing, RequestStatus};
use crate::domain::page::Page;
use crate::domain::ports::{BookRequestStore, BookStore, UserStore};
use crate::error::{AppError, Result};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    created_total: Counter<u64>,
    decided_total: Counter<u64>,
    cancelled_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            created_total: meter
                .u64_counter("bookswap_book_requests_created_total")
                .with_description("Total requests made for someone else's book")
                .build(),
            decided_total: meter
                .u64_counter("bookswap_book_requests_decided_total")
                .with_description("Total requests approved or rejected by the owner")
                .build(),
            cancelled_total: meter
                .u64_counter("bookswap_book_requests_cancelled_total")
                .with_description("Total requests withdrawn by the requester")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BookRequestService {
    requests: Arc<dyn BookRequestStore>,
    books: Arc<dyn BookStore>,
    users: Arc<dyn UserStore>,
    metrics: Metrics,
}

impl BookRequestService {
    #[must_use]
    pub fn new(requests: Arc<dyn BookRequestStore>, books: Arc<dyn BookStore>, users: Arc<dyn UserStore>) -> Self {
        Self { requests, books, users, metrics: Metrics::new() }
    }

    /// Asks the uploader of `book_id` for the book. One request per book and requester.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn create(&self, requester_id: Uuid, book_id: Uuid) -> Result<BookRequest> {
        let book =
            self.books.find_by_id(book_id).await?.ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;
        if book.is_uploaded_by(requester_id) {
            return Err(AppError::BadRequest("You cannot request your own book.".to_string()));
        }

        let request =
            self.requests.create(NewBookRequest { book_id, requester_id, owner_id: book.uploader_id }).await?;

        tracing::Span::current().record("request_id", tracing::field::display(request.id));
        self.metrics.created_total.add(1, &[]);
        Ok(request)
    }

    #[tracing::instrument(err, skip(self))]
    pub async fn check(&self, requester_id: Uuid, book_id: Uuid) -> Result<bool> {
        Ok(self.requests.find_for(book_id, requester_id).await?.is_some())
    }

    /// Requests the user sent or received, newest first.
    #[tracing::instrument(err, skip(self))]
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<RequestListing>> {
        let requests = self.requests.list_involving(user_id).await?;
        self.listings(requests).await
    }

    /// The user's requests for books whose title or slug contains `query`.
    #[tracing::instrument(err(level = "warn"), skip(self, query))]
    pub async fn search(&self, user_id: Uuid, query: &str) -> Result<Vec<RequestListing>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::BadRequest("Search query is required".to_string()));
        }

        let book_ids: Vec<Uuid> = self.books.search(query).await?.into_iter().map(|b| b.id).collect();
        let requests = self.requests.list_involving_books(user_id, &book_ids).await?;
        self.listings(requests).await
    }

    /// One page of the requests made for the owner's books.
    #[tracing::instrument(err, skip(self), fields(page = page.number, limit = page.limit))]
    pub async fn received(&self, owner_id: Uuid, page: Page) -> Result<(Vec<RequestListing>, u64)> {
        let (requests, total) = self.requests.list_received(owner_id, page).await?;
        Ok((self.listings(requests).await?, total))
    }

    #[tracing::instrument(err, skip(self))]
    pub async fn sent(&self, requester_id: Uuid) -> Result<Vec<RequestListing>> {
        let requests = self.requests.list_sent(requester_id).await?;
        self.listings(requests).await
    }

    /// Approves or rejects a pending request. Only the book's owner may decide.
    #[tracing::instrument(err(level = "warn"), skip(self, raw_status))]
    pub async fn set_status(&self, user_id: Uuid, request_id: Uuid, raw_status: &str) -> Result<BookRequest> {
        let status = RequestStatus::decision(raw_status)?;
        let request = self
            .requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book request not found".to_string()))?;
        if request.owner_id != user_id {
            return Err(AppError::Forbidden("Access denied: Not your book".to_string()));
        }
        if request.status != RequestStatus::Pending {
            return Err(AppError::BadRequest(format!(
                "Cannot update request. Current status is '{}'",
                request.status
            )));
        }

        let updated = self
            .requests
            .set_status(request_id, status)
            .await?
            .ok_or_else(|| AppError::NotFound("Book request not found".to_string()))?;

        tracing::info!(status = %status, "Book request decided");
        self.metrics.decided_total.add(1, &[KeyValue::new("status", status.as_str())]);
        Ok(updated)
    }

    /// Withdraws the caller's request for `book_id`, whatever its status.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn cancel(&self, requester_id: Uuid, book_id: Uuid) -> Result<BookRequest> {
        let not_found = || AppError::NotFound("No book request found to cancel.".to_string());
        let request = self.requests.find_for(book_id, requester_id).await?.ok_or_else(not_found)?;
        if !self.requests.delete(request.id).await? {
            return Err(not_found());
        }

        self.metrics.cancelled_total.add(1, &[]);
        Ok(request)
    }

    async fn listings(&self, requests: Vec<BookRequest>) -> Result<Vec<RequestListing>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut book_ids: Vec<Uuid> = requests.iter().map(|r| r.book_id).collect();
        book_ids.sort_unstable();
        book_ids.dedup();
        let mut user_ids: Vec<Uuid> = requests.iter().flat_map(|r| [r.requester_id, r.owner_id]).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let books: HashMap<Uuid, _> = self.books.find_many(&book_ids).await?.into_iter().map(|b| (b.id, b)).collect();
        let users: HashMap<Uuid, _> =
            self.users.find_many(&user_ids).await?.into_iter().map(|u| (u.id, u.public())).collect();

        Ok(requests
            .into_iter()
            .map(|request| RequestListing {
                book: books.get(&request.book_id).cloned(),
                requester: users.get(&request.requester_id).cloned(),
                owner: users.get(&request.owner_id).cloned(),
                request,
            })
            .collect())
    }
}
