//! Boundaries to the collaborators the core does not own: persistence,
//! outbound mail and image storage.

use crate::domain::book::{Book, BookFilter, NewBook};
use crate::domain::book_request::{BookRequest, NewBookRequest, RequestStatus};
use crate::domain::category::{Category, NewCategory};
use crate::domain::mail::Mail;
use crate::domain::message::{Message, NewMessage};
use crate::domain::page::Page;
use crate::domain::user::{NewUser, User};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// Inserts a new user.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the email is already registered.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Looks a user up by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Returns the users that exist among `ids`, in no particular order.
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>>;

    /// Persists the mutable fields of `user` and bumps `updated_at`.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the user no longer exists.
    async fn save(&self, user: &User) -> Result<User>;
}

#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    async fn create(&self, message: NewMessage) -> Result<Message>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>>;

    /// Replaces the text and marks the message as edited. `None` if it does not exist.
    async fn update_text(&self, id: Uuid, text: String, edited_at: OffsetDateTime) -> Result<Option<Message>>;

    /// Returns whether a message was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Every message exchanged between `a` and `b`, oldest first.
    async fn find_conversation(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>>;

    /// Every message `user_id` sent or received, newest first.
    async fn find_involving(&self, user_id: Uuid) -> Result<Vec<Message>>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `AppError::Conflict` if the name is taken.
    async fn create(&self, category: NewCategory) -> Result<Category>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>>;

    /// Every category, by name.
    async fn list(&self) -> Result<Vec<Category>>;

    /// Persists name and icon and bumps `updated_at`.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the category is gone and `AppError::Conflict` if the new name is taken.
    async fn save(&self, category: &Category) -> Result<Category>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Book listings. Every list is newest first.
#[async_trait]
pub trait BookStore: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `AppError::Conflict` if the slug is taken.
    async fn create(&self, book: NewBook) -> Result<Book>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Book>>;

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Book>>;

    /// Persists every field except the slug, uploader and creation time.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the book is gone.
    async fn save(&self, book: &Book) -> Result<Book>;

    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn list_by_uploader(&self, uploader_id: Uuid) -> Result<Vec<Book>>;

    /// Every book except those uploaded by `exclude_uploader`.
    async fn list_all(&self, exclude_uploader: Option<Uuid>) -> Result<Vec<Book>>;

    /// One page of the books matching `filter`, plus the number of matches overall.
    async fn filter(&self, filter: &BookFilter, page: Page) -> Result<(Vec<Book>, u64)>;

    /// Up to `limit` books related to `book`, never `book` itself.
    async fn related(&self, book: &Book, limit: usize) -> Result<Vec<Book>>;

    /// Books whose title or slug contains `query`, ignoring case.
    async fn search(&self, query: &str) -> Result<Vec<Book>>;

    async fn any_in_category(&self, category_id: Uuid) -> Result<bool>;
}

/// Book requests. Every list is newest first.
#[async_trait]
pub trait BookRequestStore: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `AppError::Conflict` if the requester already asked for the book.
    async fn create(&self, request: NewBookRequest) -> Result<BookRequest>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BookRequest>>;

    /// The request `requester_id` made for `book_id`, whatever its status.
    async fn find_for(&self, book_id: Uuid, requester_id: Uuid) -> Result<Option<BookRequest>>;

    /// `None` if the request does not exist.
    async fn set_status(&self, id: Uuid, status: RequestStatus) -> Result<Option<BookRequest>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Removes every request for a book and returns how many there were.
    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64>;

    /// Requests `user_id` made or received.
    async fn list_involving(&self, user_id: Uuid) -> Result<Vec<BookRequest>>;

    /// Requests `user_id` made or received for any of `book_ids`.
    async fn list_involving_books(&self, user_id: Uuid, book_ids: &[Uuid]) -> Result<Vec<BookRequest>>;

    /// One page of the requests for `owner_id`'s books, plus their number overall.
    async fn list_received(&self, owner_id: Uuid, page: Page) -> Result<(Vec<BookRequest>, u64)>;

    async fn list_sent(&self, requester_id: Uuid) -> Result<Vec<BookRequest>>;
}

#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    async fn send(&self, mail: Mail) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ImageStore: Send + Sync + std::fmt::Debug {
    /// Stores an uploaded image and returns the file name it is served under.
    async fn save(&self, original_name: Option<&str>, data: Bytes) -> Result<String>;

    /// Deletes a stored image. Removing a name that is already gone succeeds.
    async fn remove(&self, name: &str) -> Result<()>;
}
