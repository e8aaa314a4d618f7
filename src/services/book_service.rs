use crate::domain::book::{
    Book, BookFields, BookFilter, BookListing, MAX_BOOK_IMAGES, NewBook, RELATED_LIMIT,
};
use crate::domain::message::upload_path;
use crate::domain::page::Page;
use crate::domain::ports::{BookRequestStore, BookStore, CategoryStore, UserStore};
use crate::error::{AppError, Result};
use crate::services::upload_service::{ImageUpload, UploadService};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Attempts at a unique slug before giving up on a title.
const SLUG_ATTEMPTS: usize = 3;

#[derive(Clone, Debug)]
struct Metrics {
    listed_total: Counter<u64>,
    removed_total: Counter<u64>,
    filter_results: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            listed_total: meter
                .u64_counter("bookswap_books_listed_total")
                .with_description("Total books put up by their owners")
                .build(),
            removed_total: meter
                .u64_counter("bookswap_books_removed_total")
                .with_description("Total books taken down by their owners")
                .build(),
            filter_results: meter
                .u64_histogram("bookswap_book_filter_results")
                .with_description("Number of books matching a catalogue filter")
                .build(),
        }
    }
}

/// Book listings: ownership rules, images and the public catalogue.
#[derive(Clone, Debug)]
pub struct BookService {
    books: Arc<dyn BookStore>,
    categories: Arc<dyn CategoryStore>,
    requests: Arc<dyn BookRequestStore>,
    users: Arc<dyn UserStore>,
    uploads: UploadService,
    metrics: Metrics,
}

impl BookService {
    #[must_use]
    pub fn new(
        books: Arc<dyn BookStore>,
        categories: Arc<dyn CategoryStore>,
        requests: Arc<dyn BookRequestStore>,
        users: Arc<dyn UserStore>,
        uploads: UploadService,
    ) -> Self {
        Self { books, categories, requests, users, uploads, metrics: Metrics::new() }
    }

    /// Lists a new book for `uploader_id`.
    ///
    /// Images are written only after the fields and the category check out.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, fields, images),
        fields(image_count = images.len(), book_id = tracing::field::Empty)
    )]
    pub async fn add(&self, uploader_id: Uuid, fields: BookFields, images: Vec<ImageUpload>) -> Result<Book> {
        self.uploads.check(&images, MAX_BOOK_IMAGES, "book")?;
        let mut draft = NewBook::new(uploader_id, fields)?;
        self.ensure_category(draft.category_id).await?;

        let stored = self.uploads.store_all(images).await?;
        let result = match stored.iter().map(|n| upload_path(n)).collect::<Result<Vec<_>>>() {
            Ok(paths) => {
                draft.images = paths;
                self.create_with_unique_slug(draft).await
            }
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.uploads.discard(&stored).await;
        }
        let book = result?;

        tracing::Span::current().record("book_id", tracing::field::display(book.id));
        self.metrics.listed_total.add(1, &[KeyValue::new("product_type", book.product_type.as_str())]);
        Ok(book)
    }

    /// The catalogue, newest first, without the viewer's own books.
    #[tracing::instrument(err, skip(self))]
    pub async fn all(&self, viewer_id: Option<Uuid>) -> Result<Vec<BookListing>> {
        let books = self.books.list_all(viewer_id).await?;
        self.listings(books).await
    }

    #[tracing::instrument(err, skip(self, filter), fields(page = page.number, limit = page.limit))]
    pub async fn filter(&self, filter: &BookFilter, page: Page) -> Result<(Vec<BookListing>, u64)> {
        let (books, total) = self.books.filter(filter, page).await?;
        self.metrics.filter_results.record(total, &[]);
        Ok((self.listings(books).await?, total))
    }

    #[tracing::instrument(err, skip(self))]
    pub async fn mine(&self, user_id: Uuid) -> Result<Vec<BookListing>> {
        let books = self.books.list_by_uploader(user_id).await?;
        self.listings(books).await
    }

    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn by_slug(&self, slug: &str) -> Result<BookListing> {
        let book = self.books.find_by_slug(slug.trim()).await?.ok_or_else(book_not_found)?;
        let mut listings = self.listings(vec![book]).await?;
        listings.pop().ok_or_else(book_not_found)
    }

    /// Books in the same category or sharing a genre, newest first.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn related(&self, book_id: Uuid) -> Result<Vec<BookListing>> {
        let book = self.books.find_by_id(book_id).await?.ok_or_else(book_not_found)?;
        let related = self.books.related(&book, RELATED_LIMIT).await?;
        self.listings(related).await
    }

    /// Changes the fields present in `fields`. New images replace the old set.
    #[tracing::instrument(err(level = "warn"), skip(self, fields, images), fields(image_count = images.len()))]
    pub async fn update(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        fields: BookFields,
        images: Vec<ImageUpload>,
    ) -> Result<Book> {
        let mut book = self.books.find_by_id(book_id).await?.ok_or_else(book_not_found)?;
        if !book.is_uploaded_by(user_id) {
            tracing::warn!(owner_id = %book.uploader_id, "Rejected change to someone else's book");
            return Err(AppError::Forbidden("Access denied: Not your book".to_string()));
        }
        self.uploads.check(&images, MAX_BOOK_IMAGES, "book")?;

        let category_before = book.category_id;
        book.apply(fields)?;
        if book.category_id != category_before {
            self.ensure_category(book.category_id).await?;
        }

        let stored = self.uploads.store_all(images).await?;
        let result = match stored.iter().map(|n| upload_path(n)).collect::<Result<Vec<_>>>() {
            Ok(paths) => {
                if !paths.is_empty() {
                    book.images = paths;
                }
                self.books.save(&book).await
            }
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.uploads.discard(&stored).await;
        }
        result
    }

    /// Takes a book down along with every request for it.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete(&self, user_id: Uuid, book_id: Uuid) -> Result<Book> {
        let book = self.books.find_by_id(book_id).await?.ok_or_else(book_not_found)?;
        if !book.is_uploaded_by(user_id) {
            tracing::warn!(owner_id = %book.uploader_id, "Rejected removal of someone else's book");
            return Err(AppError::Forbidden("Forbidden: You can only delete your own book".to_string()));
        }

        let dropped = self.requests.delete_for_book(book.id).await?;
        if !self.books.delete(book.id).await? {
            return Err(book_not_found());
        }

        tracing::info!(requests_dropped = dropped, "Book removed");
        self.metrics.removed_total.add(1, &[]);
        Ok(book)
    }

    async fn ensure_category(&self, category_id: Uuid) -> Result<()> {
        if self.categories.find_by_id(category_id).await?.is_none() {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        Ok(())
    }

    /// Two books with the same title get distinct slugs by suffixing a short random tag.
    async fn create_with_unique_slug(&self, mut draft: NewBook) -> Result<Book> {
        let base = draft.slug.clone();
        let mut attempt = 0;
        loop {
            match self.books.create(draft.clone()).await {
                Err(AppError::Conflict(_)) if attempt + 1 < SLUG_ATTEMPTS => {
                    attempt += 1;
                    let tag = Uuid::new_v4().simple().to_string();
                    draft.slug = format!("{base}-{}", &tag[..8]);
                    tracing::debug!(slug = %draft.slug, "Slug taken, retrying");
                }
                other => return other,
            }
        }
    }

    /// Resolves categories and uploaders in two batched lookups.
    async fn listings(&self, books: Vec<Book>) -> Result<Vec<BookListing>> {
        if books.is_empty() {
            return Ok(Vec::new());
        }

        let mut uploader_ids: Vec<Uuid> = books.iter().map(|b| b.uploader_id).collect();
        uploader_ids.sort_unstable();
        uploader_ids.dedup();
        let uploaders: HashMap<Uuid, _> =
            self.users.find_many(&uploader_ids).await?.into_iter().map(|u| (u.id, u.public())).collect();
        let categories: HashMap<Uuid, _> = self.categories.list().await?.into_iter().map(|c| (c.id, c)).collect();

        Ok(books
            .into_iter()
            .map(|book| BookListing {
                category: categories.get(&book.category_id).cloned(),
                uploader: uploaders.get(&book.uploader_id).cloned(),
                book,
            })
            .collect())
    }
}

fn book_not_found() -> AppError {
    AppError::NotFound("Book not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryBookRequestStore, MemoryBookStore, MemoryCategoryStore, MemoryUserStore};
    use crate::adapters::storage::LocalImageStore;
    use crate::domain::book::{self, ProductType};
    use crate::domain::book_request::NewBookRequest;
    use crate::domain::category::NewCategory;
    use crate::domain::user::NewUser;
    use bytes::Bytes;
    use std::path::PathBuf;
    use time::{Duration, OffsetDateTime};

    struct Fixture {
        service: BookService,
        users: Arc<MemoryUserStore>,
        requests: Arc<MemoryBookRequestStore>,
        category: Uuid,
        dir: PathBuf,
    }

    impl Fixture {
        fn files(&self) -> usize {
            std::fs::read_dir(&self.dir).map(Iterator::count).unwrap_or(0)
        }
    }

    async fn fixture() -> Fixture {
        let dir = std::env::temp_dir().join(format!("bookswap-book-service-{}", Uuid::new_v4()));
        let images = LocalImageStore::new(&dir, 64);
        images.ensure_dir().await.unwrap();

        let users = Arc::new(MemoryUserStore::new());
        let categories = Arc::new(MemoryCategoryStore::new());
        let requests = Arc::new(MemoryBookRequestStore::new());
        let category =
            categories.create(NewCategory { name: "fiction".to_string(), icon: None }).await.unwrap().id;
        let service = BookService::new(
            Arc::new(MemoryBookStore::new()),
            categories,
            Arc::clone(&requests) as Arc<dyn BookRequestStore>,
            Arc::clone(&users) as Arc<dyn UserStore>,
            UploadService::new(Arc::new(images), 64),
        );
        Fixture { service, users, requests, category, dir }
    }

    async fn user(users: &MemoryUserStore, name: &str) -> Uuid {
        users
            .create(NewUser {
                full_name: name.to_string(),
                email: format!("{name}@bookswap.io"),
                password_hash: String::new(),
                verification_code: "000000".to_string(),
                verification_expires_at: OffsetDateTime::now_utc() + Duration::minutes(10),
            })
            .await
            .unwrap()
            .id
    }

    fn cover() -> ImageUpload {
        ImageUpload { file_name: Some("cover.png".to_string()), data: Bytes::from_static(b"png") }
    }

    fn titled(category: Uuid, title: &str) -> BookFields {
        BookFields { title: Some(title.to_string()), ..book::sample_fields(category) }
    }

    #[tokio::test]
    async fn test_add_stores_images_and_resolves_listing() {
        let fx = fixture().await;
        let me = user(&fx.users, "ann").await;

        let book = fx.service.add(me, book::sample_fields(fx.category), vec![cover(), cover()]).await.unwrap();
        assert_eq!(book.slug, "dune");
        assert_eq!(book.images.len(), 2);
        assert!(book.images.iter().all(|i| i.starts_with("uploads/") && i.ends_with(".png")));
        assert_eq!(fx.files(), 2);

        let listing = fx.service.by_slug("dune").await.unwrap();
        assert_eq!(listing.book.id, book.id);
        assert_eq!(listing.category.unwrap().name, "fiction");
        assert_eq!(listing.uploader.unwrap().full_name, "ann");

        let again = fx.service.add(me, book::sample_fields(fx.category), Vec::new()).await.unwrap();
        assert!(again.slug.starts_with("dune-"));
        assert_ne!(again.slug, book.slug);

        let _ = std::fs::remove_dir_all(&fx.dir);
    }

    #[tokio::test]
    async fn test_rejected_add_writes_no_images() {
        let fx = fixture().await;
        let me = user(&fx.users, "ann").await;

        let err = fx.service.add(me, book::sample_fields(Uuid::new_v4()), vec![cover()]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Category not found"));

        let mut fields = book::sample_fields(fx.category);
        fields.product_type = Some("sale".to_string());
        let err = fx.service.add(me, fields, vec![cover()]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Price is required for sale books"));

        let too_many = vec![cover(); MAX_BOOK_IMAGES + 1];
        let err = fx.service.add(me, book::sample_fields(fx.category), too_many).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(fx.files(), 0);

        let _ = std::fs::remove_dir_all(&fx.dir);
    }

    #[tokio::test]
    async fn test_only_uploader_may_update_or_delete() {
        let fx = fixture().await;
        let (ann, bob) = (user(&fx.users, "ann").await, user(&fx.users, "bob").await);
        let book = fx.service.add(ann, book::sample_fields(fx.category), vec![cover()]).await.unwrap();

        let change = BookFields { product_type: Some("sale".to_string()), price: Some(9.5), ..BookFields::default() };
        let err = fx.service.update(bob, book.id, change.clone(), Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Access denied: Not your book"));

        let updated = fx.service.update(ann, book.id, change, vec![cover()]).await.unwrap();
        assert_eq!(updated.product_type, ProductType::Sale);
        assert_ne!(updated.images, book.images);
        assert_eq!(updated.images.len(), 1);

        fx.requests.create(NewBookRequest { book_id: book.id, requester_id: bob, owner_id: ann }).await.unwrap();
        let err = fx.service.delete(bob, book.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Forbidden: You can only delete your own book"));

        fx.service.delete(ann, book.id).await.unwrap();
        assert!(fx.requests.list_involving(bob).await.unwrap().is_empty());
        assert!(matches!(fx.service.delete(ann, book.id).await, Err(AppError::NotFound(_))));
        let err = fx.service.update(ann, book.id, BookFields::default(), Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let _ = std::fs::remove_dir_all(&fx.dir);
    }

    #[tokio::test]
    async fn test_catalogue_views() {
        let fx = fixture().await;
        let (ann, bob) = (user(&fx.users, "ann").await, user(&fx.users, "bob").await);

        let hobbit = fx.service.add(ann, titled(fx.category, "The Hobbit"), Vec::new()).await.unwrap();
        fx.service.add(bob, titled(fx.category, "Earthsea"), Vec::new()).await.unwrap();
        fx.service.add(bob, titled(fx.category, "Dracula"), Vec::new()).await.unwrap();

        let for_ann = fx.service.all(Some(ann)).await.unwrap();
        assert_eq!(for_ann.len(), 2);
        assert!(for_ann.iter().all(|l| l.book.uploader_id == bob));
        assert_eq!(fx.service.all(None).await.unwrap().len(), 3);
        assert_eq!(fx.service.mine(bob).await.unwrap()[0].book.title, "Dracula");

        let related = fx.service.related(hobbit.id).await.unwrap();
        assert_eq!(related.len(), 2);
        assert!(related.iter().all(|l| l.book.id != hobbit.id));
        assert!(matches!(fx.service.related(Uuid::new_v4()).await, Err(AppError::NotFound(_))));

        let filter = BookFilter { search: Some("EARTH".to_string()), ..BookFilter::default() };
        let (found, total) = fx.service.filter(&filter, Page::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].book.title, "Earthsea");

        assert!(matches!(fx.service.by_slug("missing").await, Err(AppError::NotFound(ref m)) if m == "Book not found"));

        let _ = std::fs::remove_dir_all(&fx.dir);
    }
}
